//! An in-memory spatial index over Hilbert-curve-ordered points.
//!
//! Points are encoded onto a space-filling curve ([`hilbert`]) so that
//! locality in 2-D roughly maps to locality in the resulting 1-D index; a
//! sorted array of items can then be scanned over a handful of contiguous
//! [`ranges::HilbertRange`]s to answer a radius search
//! ([`collection::IndexedCollection::within`]) or a nearest-neighbor search
//! ([`collection::IndexedCollection::nearest`]) without touching the whole
//! collection.
//!
//! The core never performs geography itself: a [`geodesy::Geodesy`]
//! collaborator buffers a query point into a searchable
//! [`envelope::Envelope`] and measures metric distance, and a
//! [`grid::Projection`] collaborator maps coordinates to and from the
//! integer grid the curve is defined over. Both are pluggable; the crate
//! ships a default great-circle [`geodesy::WgsGeodesy`] and a default
//! [`grid::LinearProjection`].

pub mod collection;
pub mod envelope;
pub mod error;
pub mod geodesy;
pub mod grid;
pub mod hilbert;
pub mod item;
pub mod ranges;

pub use collection::{IndexedCollection, MutableIndexedCollection};
pub use envelope::Envelope;
pub use error::{SpatialIndexError, SpatialResult};
pub use geodesy::{Geodesy, WgsGeodesy};
pub use grid::{Coordinate, GridPoint, GridRectangle, LinearProjection, Projection};
pub use hilbert::HilbertCodec;
pub use item::IndexedItem;
pub use ranges::{HilbertRange, SearchResult};
