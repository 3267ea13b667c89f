//! Axis-aligned lon/lat envelopes.
//!
//! An [`Envelope`] is a closed rectangle in coordinate space: `min_x <= max_x`,
//! `min_y <= max_y`. Envelopes are value-semantic and immutable — every
//! operation returns a new value rather than mutating `self`, mirroring the
//! `BoundingBox` type this module is grounded on.

use serde::{Deserialize, Serialize};
use std::hash::Hash;

use crate::Coordinate;

/// An axis-aligned box in coordinate (lon/lat) space.
#[derive(Clone, Copy, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An envelope containing a single point.
    pub fn from_point(coord: Coordinate) -> Self {
        Self::new(coord.lon, coord.lat, coord.lon, coord.lat)
    }

    /// Returns the smallest envelope enclosing `self` and `coord`.
    pub fn expand(&self, coord: Coordinate) -> Self {
        Self::new(
            self.min_x.min(coord.lon),
            self.min_y.min(coord.lat),
            self.max_x.max(coord.lon),
            self.max_y.max(coord.lat),
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains_point(&self, coord: Coordinate) -> bool {
        coord.lon >= self.min_x
            && coord.lon <= self.max_x
            && coord.lat >= self.min_y
            && coord.lat <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// A formatted multi-line debug rendering, useful for dumping a
    /// [`crate::ranges::SearchResult`]'s decomposed envelopes during
    /// visualization or test failures.
    pub fn to_debug_string(&self, indent: usize) -> String {
        format!(
            "{{\n{:indent$}\"min_x\": {},\n{:indent$}\"min_y\": {},\n{:indent$}\"max_x\": {},\n{:indent$}\"max_y\": {}\n}}",
            "", self.min_x, "", self.min_y, "", self.max_x, "", self.max_y,
            indent = indent + 2
        )
    }
}
