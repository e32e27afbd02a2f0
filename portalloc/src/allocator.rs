// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port reservation engine.

use crate::provider::DynamicRangeProvider;
use crate::{AllocatorError, DynamicRange, PortRange, Protocol, RangeError};
use concurrency::singleflight::Group;
use concurrency::sync::{Arc, ArcSwapOption, Mutex};
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::net::IpAddr;
use strum::EnumCount;
use tracing::{debug, info, trace, warn};

/// Whether anonymous (port 0) requests may be served from the dynamic port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePolicy {
    /// Never hand out ports the operating system may pick for outbound connections.
    ExcludeDynamic,
    /// Consider every port.
    IncludeDynamic,
}

/// Tunables of a [`PortAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Default policy of [`PortAllocator::allocate`]: keep anonymous requests out of the dynamic
    /// range.
    pub exclude_dynamic_range: bool,
    /// Range assumed when the provider fails.  Without one, the failure is reported.
    pub fallback_range: Option<DynamicRange>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            exclude_dynamic_range: true,
            fallback_range: None,
        }
    }
}

impl AllocatorConfig {
    fn policy(&self) -> RangePolicy {
        if self.exclude_dynamic_range {
            RangePolicy::ExcludeDynamic
        } else {
            RangePolicy::IncludeDynamic
        }
    }
}

/// Reserved ports of one protocol, by address.  Addresses without reservations have no entry.
type Reservations = HashMap<IpAddr, RoaringBitmap>;

/// Lowest port of `[lo, hi]` not in `reserved`.
fn first_free(reserved: Option<&RoaringBitmap>, lo: u16, hi: u16) -> Option<u16> {
    if lo > hi {
        return None;
    }
    let Some(reserved) = reserved else {
        return Some(lo);
    };
    let (lo32, hi32) = (u32::from(lo), u32::from(hi));
    if reserved.range_cardinality(lo32..=hi32) > u64::from(hi32 - lo32) {
        return None;
    }
    (lo..=hi).find(|port| !reserved.contains(u32::from(*port)))
}

/// Tracks which `(protocol, address, port)` keys are reserved.
///
/// Every protocol has its own lock, held only for the in-memory lookup and update.  The dynamic
/// range is learned from the provider outside of those locks, once, and cached: concurrent first
/// users share a single query.
pub struct PortAllocator {
    provider: Arc<dyn DynamicRangeProvider>,
    config: AllocatorConfig,
    reservations: [Mutex<Reservations>; Protocol::COUNT],
    dynamic: ArcSwapOption<DynamicRange>,
    fetch: Group<(), Result<DynamicRange, RangeError>>,
}

impl PortAllocator {
    /// Create an allocator with no reservations.  The provider is not queried until needed.
    #[must_use]
    pub fn new(provider: Arc<dyn DynamicRangeProvider>, config: AllocatorConfig) -> PortAllocator {
        debug!(
            "port allocator: provider {}, config {config:?}",
            provider.name()
        );
        PortAllocator {
            provider,
            config,
            reservations: std::array::from_fn(|_| Mutex::new(Reservations::new())),
            dynamic: ArcSwapOption::empty(),
            fetch: Group::new(),
        }
    }

    /// The configuration this allocator was built with.
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    fn table(&self, proto: Protocol) -> &Mutex<Reservations> {
        &self.reservations[proto.index()]
    }

    fn query(&self) -> Result<DynamicRange, RangeError> {
        match self.provider.dynamic_range() {
            Ok(range) => {
                info!("dynamic port range {range} (from {})", self.provider.name());
                Ok(range)
            }
            Err(e) => match self.config.fallback_range {
                Some(fallback) => {
                    warn!(
                        "{} failed to report the dynamic port range ({e}), assuming {fallback}",
                        self.provider.name()
                    );
                    Ok(fallback)
                }
                None => Err(e),
            },
        }
    }

    fn cached_range(&self) -> Option<DynamicRange> {
        self.dynamic.load_full().map(|range| *range)
    }

    /// The dynamic port range, queried from the provider on first use and cached.
    ///
    /// Concurrent callers on a cold cache wait for a single query and share its outcome.  Failed
    /// queries are not cached: the next caller asks again.
    ///
    /// # Errors
    ///
    /// Returns [`AllocatorError::DynamicRange`] if the provider fails and no fallback range is
    /// configured.
    pub fn dynamic_range(&self) -> Result<DynamicRange, AllocatorError> {
        if let Some(range) = self.cached_range() {
            return Ok(range);
        }
        let (result, shared) = self.fetch.work((), || {
            // a flight which landed while we were joining already filled the cache
            if let Some(range) = self.cached_range() {
                return Ok(range);
            }
            let range = self.query()?;
            // an explicit override set while the query ran takes precedence
            let previous = self
                .dynamic
                .compare_and_swap(&None::<Arc<DynamicRange>>, Some(Arc::new(range)));
            match previous.as_ref() {
                Some(current) => {
                    debug!("keeping dynamic port range {current} set during the query");
                    Ok(**current)
                }
                None => Ok(range),
            }
        });
        if shared {
            trace!("shared dynamic port range query");
        }
        result.map_err(AllocatorError::from)
    }

    /// Override the cached dynamic port range.
    pub fn set_dynamic_range(&self, range: DynamicRange) {
        info!("dynamic port range set to {range}");
        self.dynamic.store(Some(Arc::new(range)));
    }

    /// Forget the cached dynamic port range; it will be queried again when next needed.
    pub fn invalidate_dynamic_range(&self) {
        debug!("dynamic port range invalidated");
        self.dynamic.store(None);
    }

    /// Reserve `port` for `proto` on `addr`.
    ///
    /// With `port == 0`, reserve the lowest free port, keeping out of the dynamic range unless the
    /// allocator is configured otherwise.  A non-zero `port` is reserved as asked, whether or not
    /// it lies in the dynamic range.
    ///
    /// # Errors
    ///
    /// * [`AllocatorError::PortInUse`] if `port` is non-zero and already reserved.
    /// * [`AllocatorError::RangeExhausted`] if `port` is zero and no eligible port is free.
    /// * [`AllocatorError::DynamicRange`] if the dynamic range is needed and can not be learned.
    pub fn allocate(
        &self,
        proto: Protocol,
        addr: IpAddr,
        port: u16,
    ) -> Result<u16, AllocatorError> {
        self.allocate_with(proto, addr, port, self.config.policy())
    }

    /// Like [`PortAllocator::allocate`], with an explicit policy for anonymous requests.
    ///
    /// # Errors
    ///
    /// See [`PortAllocator::allocate`].
    #[tracing::instrument(level = "debug", skip(self), ret)]
    pub fn allocate_with(
        &self,
        proto: Protocol,
        addr: IpAddr,
        port: u16,
        policy: RangePolicy,
    ) -> Result<u16, AllocatorError> {
        if port != 0 {
            return self.reserve(proto, addr, port);
        }
        let excluded = match policy {
            RangePolicy::ExcludeDynamic => Some(self.dynamic_range()?),
            RangePolicy::IncludeDynamic => None,
        };
        self.reserve_lowest(proto, addr, PortRange::ALL, excluded)
    }

    /// Reserve the lowest free port of `window`.  The dynamic range is not excluded: the caller
    /// picked the window.
    ///
    /// # Errors
    ///
    /// Returns [`AllocatorError::RangeExhausted`] if every port of `window` is reserved.
    #[tracing::instrument(level = "debug", skip(self), ret)]
    pub fn allocate_in_range(
        &self,
        proto: Protocol,
        addr: IpAddr,
        window: PortRange,
    ) -> Result<u16, AllocatorError> {
        self.reserve_lowest(proto, addr, window, None)
    }

    fn reserve(&self, proto: Protocol, addr: IpAddr, port: u16) -> Result<u16, AllocatorError> {
        let mut table = self.table(proto).lock();
        if !table.entry(addr).or_default().insert(u32::from(port)) {
            return Err(AllocatorError::PortInUse { proto, addr, port });
        }
        Ok(port)
    }

    fn reserve_lowest(
        &self,
        proto: Protocol,
        addr: IpAddr,
        window: PortRange,
        excluded: Option<DynamicRange>,
    ) -> Result<u16, AllocatorError> {
        let (lo, hi) = (window.first(), window.last());
        let mut table = self.table(proto).lock();
        let reserved = table.get(&addr);
        let port = match excluded {
            None => first_free(reserved, lo, hi),
            Some(dynamic) => {
                // below the dynamic range, then above it
                let below = first_free(reserved, lo, hi.min(dynamic.start() - 1));
                below.or_else(|| {
                    dynamic
                        .end()
                        .checked_add(1)
                        .and_then(|above| first_free(reserved, lo.max(above), hi))
                })
            }
        };
        let Some(port) = port else {
            return Err(AllocatorError::RangeExhausted { proto, addr });
        };
        table.entry(addr).or_default().insert(u32::from(port));
        Ok(port)
    }

    /// Release a reservation.  Releasing a key which is not reserved does nothing.
    pub fn release(&self, proto: Protocol, addr: IpAddr, port: u16) {
        let mut table = self.table(proto).lock();
        let Some(reserved) = table.get_mut(&addr) else {
            return;
        };
        if reserved.remove(u32::from(port)) {
            debug!("released {proto} {addr} port {port}");
        }
        if reserved.is_empty() {
            table.remove(&addr);
        }
    }

    /// Release every reservation.
    pub fn release_all(&self) {
        for table in &self.reservations {
            table.lock().clear();
        }
        debug!("released all ports");
    }

    /// Tell if the key is reserved.
    #[must_use]
    pub fn is_reserved(&self, proto: Protocol, addr: IpAddr, port: u16) -> bool {
        self.table(proto)
            .lock()
            .get(&addr)
            .is_some_and(|reserved| reserved.contains(u32::from(port)))
    }

    /// Number of reserved keys, all protocols included.
    #[must_use]
    pub fn reserved_count(&self) -> u64 {
        self.reservations
            .iter()
            .map(|table| table.lock().values().map(RoaringBitmap::len).sum::<u64>())
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::{AllocatorConfig, PortAllocator, RangePolicy};
    use crate::provider::{DynamicRangeProvider, StaticProvider};
    use crate::{AllocatorError, DynamicRange, PortRange, Protocol, RangeError};
    use std::collections::BTreeSet;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tracing_test::traced_test;

    const ANY: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));

    /// Counts queries; answers after an optional delay.
    struct CountingProvider {
        answer: Result<DynamicRange, RangeError>,
        delay: Duration,
        queries: AtomicUsize,
    }

    impl CountingProvider {
        fn new(answer: Result<DynamicRange, RangeError>) -> Arc<CountingProvider> {
            Arc::new(CountingProvider {
                answer,
                delay: Duration::ZERO,
                queries: AtomicUsize::new(0),
            })
        }

        fn slow(answer: Result<DynamicRange, RangeError>) -> Arc<CountingProvider> {
            Arc::new(CountingProvider {
                answer,
                delay: Duration::from_millis(50),
                queries: AtomicUsize::new(0),
            })
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    impl DynamicRangeProvider for CountingProvider {
        fn dynamic_range(&self) -> Result<DynamicRange, RangeError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.answer.clone()
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn range(start: u16, end: u16) -> DynamicRange {
        DynamicRange::new(start, end).unwrap()
    }

    fn allocator(dynamic: DynamicRange) -> PortAllocator {
        PortAllocator::new(
            Arc::new(StaticProvider::new(dynamic)),
            AllocatorConfig::default(),
        )
    }

    #[test]
    #[traced_test]
    fn explicit_ports() {
        let alloc = allocator(DynamicRange::IANA);
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 8080), Ok(8080));
        assert_eq!(
            alloc.allocate(Protocol::Tcp, ANY, 8080),
            Err(AllocatorError::PortInUse {
                proto: Protocol::Tcp,
                addr: ANY,
                port: 8080,
            })
        );
        // other protocols and addresses are other keys
        assert_eq!(alloc.allocate(Protocol::Udp, ANY, 8080), Ok(8080));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 8080), Ok(8080));
        // explicit requests may land in the dynamic range
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 50000), Ok(50000));
        assert_eq!(alloc.reserved_count(), 4);

        alloc.release(Protocol::Tcp, ANY, 8080);
        assert!(!alloc.is_reserved(Protocol::Tcp, ANY, 8080));
        assert!(alloc.is_reserved(Protocol::Tcp, HOST, 8080));
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 8080), Ok(8080));
    }

    #[test]
    fn release_of_free_key_is_a_noop() {
        let alloc = allocator(DynamicRange::IANA);
        alloc.release(Protocol::Sctp, HOST, 9);
        alloc.release(Protocol::Sctp, HOST, 9);
        assert_eq!(alloc.reserved_count(), 0);
        assert_eq!(alloc.allocate(Protocol::Sctp, HOST, 9), Ok(9));
        alloc.release(Protocol::Sctp, HOST, 10);
        assert!(alloc.is_reserved(Protocol::Sctp, HOST, 9));
    }

    #[test]
    #[traced_test]
    fn anonymous_ports_avoid_the_dynamic_range() {
        let alloc = allocator(range(1, 1023));
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 0), Ok(1024));
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 0), Ok(1025));
        alloc.release(Protocol::Tcp, ANY, 1024);
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 0), Ok(1024));
        assert!(logs_contain("dynamic port range 1-1023"));
    }

    #[test]
    fn anonymous_ports_skip_reserved_ones() {
        let alloc = allocator(DynamicRange::IANA);
        for port in 1..=3 {
            alloc.allocate(Protocol::Udp, HOST, port).unwrap();
        }
        assert_eq!(alloc.allocate(Protocol::Udp, HOST, 0), Ok(4));
        assert_eq!(alloc.allocate(Protocol::Udp, ANY, 0), Ok(1));
    }

    #[test]
    fn anonymous_ports_above_the_dynamic_range() {
        let alloc = allocator(range(1, 60000));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(60001));
        let alloc = allocator(range(1, 65535));
        assert_eq!(
            alloc.allocate(Protocol::Tcp, HOST, 0),
            Err(AllocatorError::RangeExhausted {
                proto: Protocol::Tcp,
                addr: HOST,
            })
        );
        assert_eq!(alloc.reserved_count(), 0);
    }

    #[test]
    fn include_dynamic_policy() {
        let alloc = allocator(range(1, 65535));
        assert_eq!(
            alloc.allocate_with(Protocol::Tcp, HOST, 0, RangePolicy::IncludeDynamic),
            Ok(1)
        );
        let alloc = PortAllocator::new(
            Arc::new(StaticProvider::new(range(1, 65535))),
            AllocatorConfig {
                exclude_dynamic_range: false,
                fallback_range: None,
            },
        );
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(1));
    }

    #[test]
    fn exhaustion_leaves_state_unchanged() {
        let alloc = allocator(range(6, 65535));
        let ports: Vec<_> = (0..5)
            .map(|_| alloc.allocate(Protocol::Tcp, HOST, 0).unwrap())
            .collect();
        assert_eq!(ports, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            alloc.allocate(Protocol::Tcp, HOST, 0),
            Err(AllocatorError::RangeExhausted {
                proto: Protocol::Tcp,
                addr: HOST,
            })
        );
        assert_eq!(alloc.reserved_count(), 5);
        alloc.release(Protocol::Tcp, HOST, 3);
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(3));
    }

    #[test]
    fn wildcard_and_specific_addresses_are_distinct() {
        let alloc = allocator(DynamicRange::IANA);
        let v6_any = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
        assert_eq!(alloc.allocate(Protocol::Tcp, ANY, 80), Ok(80));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 80), Ok(80));
        assert_eq!(alloc.allocate(Protocol::Tcp, v6_any, 80), Ok(80));
        assert_eq!(alloc.reserved_count(), 3);
    }

    #[test]
    fn allocate_in_range_stays_in_the_window() {
        let alloc = allocator(DynamicRange::IANA);
        let window = PortRange::new(50000, 50002).unwrap();
        alloc.allocate(Protocol::Tcp, HOST, 50001).unwrap();
        let next = || alloc.allocate_in_range(Protocol::Tcp, HOST, window);
        assert_eq!(next(), Ok(50000));
        assert_eq!(next(), Ok(50002));
        assert_eq!(
            next(),
            Err(AllocatorError::RangeExhausted {
                proto: Protocol::Tcp,
                addr: HOST,
            })
        );
    }

    #[test]
    fn release_all_clears_everything() {
        let alloc = allocator(DynamicRange::IANA);
        for proto in [Protocol::Tcp, Protocol::Udp, Protocol::Sctp] {
            alloc.allocate(proto, HOST, 0).unwrap();
            alloc.allocate(proto, ANY, 443).unwrap();
        }
        assert_eq!(alloc.reserved_count(), 6);
        alloc.release_all();
        assert_eq!(alloc.reserved_count(), 0);
        assert_eq!(alloc.allocate(Protocol::Udp, ANY, 443), Ok(443));
    }

    #[test]
    fn provider_is_queried_lazily_and_once() {
        let provider = CountingProvider::new(Ok(range(1, 1023)));
        let alloc = PortAllocator::new(provider.clone(), AllocatorConfig::default());
        alloc.allocate(Protocol::Tcp, HOST, 80).unwrap();
        assert_eq!(provider.queries(), 0);
        alloc.allocate(Protocol::Tcp, HOST, 0).unwrap();
        alloc.allocate(Protocol::Udp, HOST, 0).unwrap();
        assert_eq!(alloc.dynamic_range(), Ok(range(1, 1023)));
        assert_eq!(provider.queries(), 1);

        alloc.invalidate_dynamic_range();
        alloc.allocate(Protocol::Tcp, HOST, 0).unwrap();
        assert_eq!(provider.queries(), 2);
    }

    #[test]
    fn concurrent_first_use_queries_once() {
        const THREADS: usize = 16;
        let provider = CountingProvider::slow(Ok(range(1, 1023)));
        let alloc = Arc::new(PortAllocator::new(
            provider.clone(),
            AllocatorConfig::default(),
        ));
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    alloc.allocate(Protocol::Tcp, HOST, 0).unwrap()
                })
            })
            .collect();
        let ports: BTreeSet<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(provider.queries(), 1);
        assert_eq!(ports, (1024..1024 + 16).collect::<BTreeSet<u16>>());
    }

    #[test]
    fn set_dynamic_range_overrides_the_provider() {
        let provider = CountingProvider::new(Ok(range(1, 1023)));
        let alloc = PortAllocator::new(provider.clone(), AllocatorConfig::default());
        alloc.set_dynamic_range(range(1, 2047));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(2048));
        assert_eq!(provider.queries(), 0);
    }

    #[test]
    fn override_during_a_query_is_kept() {
        let provider = CountingProvider::slow(Ok(range(1, 1023)));
        let alloc = Arc::new(PortAllocator::new(
            provider.clone(),
            AllocatorConfig::default(),
        ));
        let first = {
            let alloc = Arc::clone(&alloc);
            thread::spawn(move || alloc.allocate(Protocol::Tcp, HOST, 0))
        };
        while provider.queries() == 0 {
            thread::yield_now();
        }
        alloc.set_dynamic_range(range(1, 2047));
        assert_eq!(first.join().unwrap(), Ok(2048));
        assert_eq!(alloc.dynamic_range(), Ok(range(1, 2047)));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(2049));
        assert_eq!(provider.queries(), 1);
    }

    #[test]
    #[traced_test]
    fn query_failures_are_reported_and_not_cached() {
        let failure = RangeError::QueryFailed("no procfs".to_string());
        let provider = CountingProvider::new(Err(failure.clone()));
        let alloc = PortAllocator::new(provider.clone(), AllocatorConfig::default());
        assert_eq!(
            alloc.allocate(Protocol::Tcp, HOST, 0),
            Err(AllocatorError::DynamicRange(failure.clone()))
        );
        assert_eq!(
            alloc.allocate(Protocol::Tcp, HOST, 0),
            Err(AllocatorError::DynamicRange(failure))
        );
        assert_eq!(provider.queries(), 2);
        assert_eq!(alloc.reserved_count(), 0);
        // explicit requests do not need the range
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 22), Ok(22));
    }

    #[test]
    #[traced_test]
    fn fallback_range_is_used_on_failure() {
        let provider = CountingProvider::new(Err(RangeError::ParseFailed("garbage".to_string())));
        let alloc = PortAllocator::new(
            provider.clone(),
            AllocatorConfig {
                exclude_dynamic_range: true,
                fallback_range: Some(range(1, 99)),
            },
        );
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(100));
        assert_eq!(alloc.allocate(Protocol::Tcp, HOST, 0), Ok(101));
        assert_eq!(provider.queries(), 1);
        assert!(logs_contain("assuming 1-99"));
    }

    #[test]
    fn concurrent_requests_for_one_key() {
        const THREADS: usize = 8;
        let alloc = Arc::new(allocator(DynamicRange::IANA));
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    alloc.allocate(Protocol::Tcp, HOST, 8443)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, AllocatorError::PortInUse { port: 8443, .. }))
        );
    }

    #[test]
    fn concurrent_distinct_explicit_ports() {
        let alloc = Arc::new(allocator(DynamicRange::IANA));
        let handles: Vec<_> = (1..=64u16)
            .map(|port| {
                let alloc = Arc::clone(&alloc);
                thread::spawn(move || alloc.allocate(Protocol::Udp, HOST, port + 1000))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(alloc.reserved_count(), 64);
    }

    #[test]
    fn concurrent_anonymous_requests_share_scarce_ports() {
        const THREADS: usize = 12;
        let alloc = Arc::new(allocator(range(6, 65535)));
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    alloc.allocate(Protocol::Tcp, ANY, 0)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let granted: BTreeSet<u16> = results.iter().filter_map(|r| r.clone().ok()).collect();
        assert_eq!(granted, (1..=5).collect::<BTreeSet<u16>>());
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AllocatorError::RangeExhausted { .. })))
                .count(),
            THREADS - 5
        );
    }
}
