// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Traits shared by the ip prefix types.
//!
//! Every prefix covers the closed range `[first_address, last_address]`.  Containment and overlap
//! are both decided on that range, which keeps the arithmetic identical for both address families.

/// Trait to describe containment relationships between different data types.
pub trait Contains<T> {
    /// Returns true if self "contains" other
    fn contains(&self, other: T) -> bool;
}

/// Trait to describe address range intersection between prefixes.
pub trait Overlaps<T: ?Sized = Self> {
    /// Returns true if the address ranges covered by `self` and `other` share at least one address.
    ///
    /// The relation is symmetric and reflexive.
    fn overlaps(&self, other: &T) -> bool;
}

/// Closed ranges `[a_first, a_last]` and `[b_first, b_last]` intersect.
#[inline]
pub(crate) fn ranges_intersect<T: Ord>(a_first: T, a_last: T, b_first: T, b_last: T) -> bool {
    a_first <= b_last && b_first <= a_last
}

#[cfg(test)]
mod test {
    use super::ranges_intersect;

    #[test]
    fn closed_range_intersection() {
        assert!(ranges_intersect(0, 10, 10, 20));
        assert!(ranges_intersect(10, 20, 0, 10));
        assert!(ranges_intersect(0, 20, 5, 6));
        assert!(ranges_intersect(5, 5, 5, 5));
        assert!(!ranges_intersect(0, 9, 10, 20));
        assert!(!ranges_intersect(21, 30, 10, 20));
    }
}
