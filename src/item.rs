//! The trait an indexed collection's elements must implement.

/// An element that can be placed in an [`crate::collection::IndexedCollection`].
///
/// Implementors carry their own pre-computed Hilbert index and grid
/// position; the collection never recomputes them, it only trusts and
/// scans them.
pub trait IndexedItem {
    /// The Hilbert curve index this item was encoded at.
    fn hid(&self) -> u64;

    /// The grid X coordinate this item was encoded at.
    fn x(&self) -> u64;

    /// The grid Y coordinate this item was encoded at.
    fn y(&self) -> u64;
}
