//! Indexed collection (C5): radius search and nearest-neighbor search over a
//! Hilbert-sorted array via monotone binary-search range scans.

use log::debug;
use parking_lot::RwLock;

use crate::error::{SpatialIndexError, SpatialResult};
use crate::geodesy::Geodesy;
use crate::grid::Coordinate;
use crate::hilbert::HilbertCodec;
use crate::item::IndexedItem;
use crate::ranges::HilbertRange;

/// Default per-query range budget handed to the range generator, matching
/// the value the specification calls out as its default target.
const DEFAULT_MAX_RANGES: usize = 128;

/// Scans `items[cursor..]` for the candidates covered by `range`, handling
/// the duplicate-`hid` walk-back, and returns their indices plus the cursor
/// to resume from for the next (ascending) range. `items` is assumed sorted
/// ascending by `hid`.
fn scan_range<T: IndexedItem>(
    items: &[T],
    range: HilbertRange,
    cursor: usize,
    out: &mut Vec<usize>,
) -> usize {
    let idx_in_tail = items[cursor..].partition_point(|item| item.hid() < range.start);
    let mut idx = cursor + idx_in_tail;

    if idx < items.len() && items[idx].hid() == range.start {
        while idx > cursor && items[idx - 1].hid() == range.start {
            idx -= 1;
        }
    }

    let mut i = idx;
    while i < items.len() && items[i].hid() <= range.end {
        out.push(i);
        i += 1;
    }
    i
}

/// Scans every range in ascending order, carrying the cursor forward
/// between ranges (cursor monotonicity — see module docs).
fn scan_ranges<T: IndexedItem>(items: &[T], ranges: &[HilbertRange]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for range in ranges {
        cursor = scan_range(items, *range, cursor, &mut out);
    }
    out
}

/// Picks the pivot `hid` a nearest-neighbor search widens its search
/// rectangle around, per the binary-search-then-tie-break rule in the
/// specification: exact match wins; past the end picks the last item;
/// otherwise the closer of the two straddling items by `|hid - q|`,
/// favoring the larger `hid` on a tie.
fn nearest_pivot<T: IndexedItem>(items: &[T], q: u64) -> u64 {
    let idx = items.partition_point(|item| item.hid() < q);
    if idx < items.len() && items[idx].hid() == q {
        return q;
    }
    if idx >= items.len() {
        return items[items.len() - 1].hid();
    }
    if idx == 0 {
        return items[0].hid();
    }
    let before = items[idx - 1].hid();
    let after = items[idx].hid();
    let d_before = q.abs_diff(before);
    let d_after = q.abs_diff(after);
    if d_before < d_after {
        before
    } else {
        after
    }
}

fn sort_by_distance<T>(mut candidates: Vec<(T, f64)>) -> Vec<T> {
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("distance is never NaN"));
    candidates.into_iter().map(|(item, _)| item).collect()
}

/// An immutable, Hilbert-sorted array of items supporting radius and
/// nearest-neighbor queries. Thread-safe for concurrent queries without
/// external synchronization: every query is local to its call.
pub struct IndexedCollection<T: IndexedItem> {
    items: Vec<T>,
    codec: HilbertCodec,
    geodesy: Box<dyn Geodesy>,
}

impl<T: IndexedItem> IndexedCollection<T> {
    /// Builds a collection from an iterator that is *already* sorted
    /// ascending by `hid`. In debug builds this is verified and a
    /// [`SpatialIndexError::DuplicateIndexInputNotSorted`] is returned on
    /// violation; release builds trust the contract and never scan the
    /// input up front, since with large collections that scan would
    /// dominate build cost.
    pub fn build(
        items: impl IntoIterator<Item = T>,
        codec: HilbertCodec,
        geodesy: Box<dyn Geodesy>,
    ) -> SpatialResult<Self> {
        let items: Vec<T> = items.into_iter().collect();

        #[cfg(debug_assertions)]
        for (i, pair) in items.windows(2).enumerate() {
            if pair[1].hid() < pair[0].hid() {
                return Err(SpatialIndexError::DuplicateIndexInputNotSorted(
                    i + 1,
                    pair[1].hid(),
                    pair[0].hid(),
                ));
            }
        }

        debug!("built indexed collection with {} items", items.len());
        Ok(Self {
            items,
            codec,
            geodesy,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items within `meters` of `coord`, ascending by distance.
    pub fn within(&self, coord: Coordinate, meters: f64) -> SpatialResult<Vec<&T>> {
        let envelope = self.geodesy.buffer(coord, meters);
        let search = self.codec.ranges_for(envelope, DEFAULT_MAX_RANGES)?;
        let indices = scan_ranges(&self.items, &search.ranges);

        let mut candidates: Vec<(&T, f64)> = Vec::with_capacity(indices.len());
        for idx in indices {
            let item = &self.items[idx];
            let item_coord = self.codec.point_to_coordinate(item.x(), item.y());
            let d = self.geodesy.distance(item_coord, coord);
            if d <= meters {
                candidates.push((item, d));
            }
        }
        Ok(sort_by_distance(candidates))
    }

    /// All items in the window around `coord`'s nearest Hilbert neighbor,
    /// ascending by distance; the first result has minimum distance among
    /// all items in the collection.
    pub fn nearest(&self, coord: Coordinate) -> SpatialResult<Vec<&T>> {
        if self.items.is_empty() {
            return Ok(Vec::new());
        }

        let query_point = self.codec.project(coord);
        let q = self.codec.encode_point(query_point.x, query_point.y);
        let pivot_hid = nearest_pivot(&self.items, q);
        let mut half = initial_half(&self.codec, query_point, pivot_hid);

        loop {
            let search = self.codec.ranges_for_window(query_point, half, DEFAULT_MAX_RANGES)?;
            let indices = scan_ranges(&self.items, &search.ranges);
            let candidates: Vec<(&T, f64)> = indices
                .into_iter()
                .map(|idx| {
                    let item = &self.items[idx];
                    let item_coord = self.codec.point_to_coordinate(item.x(), item.y());
                    (item, self.geodesy.distance(item_coord, coord))
                })
                .collect();

            if window_is_conclusive(&self.codec, self.geodesy.as_ref(), coord, query_point, half, &candidates) {
                return Ok(sort_by_distance(candidates));
            }
            half = widen_half(half, self.codec.order());
        }
    }
}

/// Euclidean grid half-side to the pivot's point — the nearest-neighbor
/// search's initial guess before any widen-and-verify pass.
fn initial_half(codec: &HilbertCodec, query_point: crate::grid::GridPoint, pivot_hid: u64) -> i64 {
    let (px, py) = codec.decode_point(pivot_hid);
    let dx = query_point.x as f64 - px as f64;
    let dy = query_point.y as f64 - py as f64;
    (dx * dx + dy * dy).sqrt().ceil() as i64
}

/// Doubles the search half-side, capped at the grid extent so the loop
/// terminates: once `half` covers the whole grid a rescan cannot find
/// anything new.
fn widen_half(half: i64, order: u32) -> i64 {
    let grid_size = 1i64 << order;
    (half * 2 + 1).min(grid_size)
}

/// True if the best candidate found in a `half`-sided window is provably the
/// metric nearest: its distance is strictly less than the distance from
/// `coord` to the window's own boundary (so nothing outside the window could
/// be closer), or the window already spans the whole grid.
///
/// The window's four edges are not equidistant in metric terms: a
/// [`LinearProjection`](crate::grid::LinearProjection) grid cell spans twice
/// as many meters in `x` (360 degrees of longitude) as in `y` (180 degrees of
/// latitude), so the nearer of the two `y`-edges is routinely closer than
/// either `x`-edge. All four edges (not just the `x`-edge the window was
/// centered on) must be checked and the closest one used, or a candidate just
/// inside one edge can be accepted as "nearest" while a strictly closer item
/// just outside a different edge goes unscanned.
///
/// This resolves spec.md §9's Open Question on `CreateBox1D`: the rectangle
/// built from the Hilbert neighbor's grid distance is a bound, not a
/// guarantee, on the metric nearest neighbor — so verify it before trusting
/// it, widening and rescanning when it isn't yet conclusive.
fn window_is_conclusive<T>(
    codec: &HilbertCodec,
    geodesy: &dyn Geodesy,
    coord: Coordinate,
    query_point: crate::grid::GridPoint,
    half: i64,
    candidates: &[(T, f64)],
) -> bool {
    let grid_size = 1i64 << codec.order();
    if half >= grid_size {
        return true;
    }
    let min_d = candidates.iter().map(|&(_, d)| d).fold(f64::INFINITY, f64::min);
    if !min_d.is_finite() {
        return false;
    }
    let x0 = query_point.x as i64;
    let y0 = query_point.y as i64;
    let edges = [
        ((x0 + half).clamp(0, grid_size - 1) as u64, query_point.y),
        ((x0 - half).clamp(0, grid_size - 1) as u64, query_point.y),
        (query_point.x, (y0 + half).clamp(0, grid_size - 1) as u64),
        (query_point.x, (y0 - half).clamp(0, grid_size - 1) as u64),
    ];
    let edge_distance = edges
        .into_iter()
        .map(|(ex, ey)| geodesy.distance(coord, codec.point_to_coordinate(ex, ey)))
        .fold(f64::INFINITY, f64::min);
    min_d < edge_distance
}

/// A mutable variant of [`IndexedCollection`] sharing its array between
/// readers and writers under a reader/writer exclusion discipline: many
/// readers or one writer, never both. Each query acquires a read lease only
/// for the candidate-extraction phase (binary search + scan); the
/// subsequent distance filter and sort run against the cloned snapshot
/// outside the lease. Writers hold exclusion for one insertion or removal.
pub struct MutableIndexedCollection<T: IndexedItem + Clone> {
    items: RwLock<Vec<T>>,
    codec: HilbertCodec,
    geodesy: Box<dyn Geodesy>,
}

impl<T: IndexedItem + Clone> MutableIndexedCollection<T> {
    pub fn build(
        items: impl IntoIterator<Item = T>,
        codec: HilbertCodec,
        geodesy: Box<dyn Geodesy>,
    ) -> SpatialResult<Self> {
        let items: Vec<T> = items.into_iter().collect();

        #[cfg(debug_assertions)]
        for (i, pair) in items.windows(2).enumerate() {
            if pair[1].hid() < pair[0].hid() {
                return Err(SpatialIndexError::DuplicateIndexInputNotSorted(
                    i + 1,
                    pair[1].hid(),
                    pair[0].hid(),
                ));
            }
        }

        Ok(Self {
            items: RwLock::new(items),
            codec,
            geodesy,
        })
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Inserts `item` at its sorted position under a write lease.
    pub fn add(&self, item: T) {
        let mut items = self.items.write();
        let idx = items.partition_point(|existing| existing.hid() < item.hid());
        items.insert(idx, item);
    }

    /// Removes the first item matching `hid`, `x`, `y` under a write
    /// lease. Returns whether an item was removed.
    pub fn remove(&self, hid: u64, x: u64, y: u64) -> bool {
        let mut items = self.items.write();
        let start = items.partition_point(|item| item.hid() < hid);
        let pos = items[start..]
            .iter()
            .take_while(|item| item.hid() == hid)
            .position(|item| item.x() == x && item.y() == y);
        match pos {
            Some(p) => {
                items.remove(start + p);
                true
            }
            None => false,
        }
    }

    pub fn within(&self, coord: Coordinate, meters: f64) -> SpatialResult<Vec<T>> {
        let envelope = self.geodesy.buffer(coord, meters);
        let search = self.codec.ranges_for(envelope, DEFAULT_MAX_RANGES)?;

        let snapshot: Vec<T> = {
            let items = self.items.read();
            let indices = scan_ranges(&items, &search.ranges);
            indices.into_iter().map(|idx| items[idx].clone()).collect()
        };

        let mut candidates: Vec<(T, f64)> = Vec::with_capacity(snapshot.len());
        for item in snapshot {
            let item_coord = self.codec.point_to_coordinate(item.x(), item.y());
            let d = self.geodesy.distance(item_coord, coord);
            if d <= meters {
                candidates.push((item, d));
            }
        }
        Ok(sort_by_distance(candidates))
    }

    pub fn nearest(&self, coord: Coordinate) -> SpatialResult<Vec<T>> {
        let query_point = self.codec.project(coord);
        let q = self.codec.encode_point(query_point.x, query_point.y);

        let mut half = {
            let items = self.items.read();
            if items.is_empty() {
                return Ok(Vec::new());
            }
            let pivot_hid = nearest_pivot(&items, q);
            initial_half(&self.codec, query_point, pivot_hid)
        };

        loop {
            let search = self.codec.ranges_for_window(query_point, half, DEFAULT_MAX_RANGES)?;
            let snapshot: Vec<T> = {
                let items = self.items.read();
                let indices = scan_ranges(&items, &search.ranges);
                indices.into_iter().map(|idx| items[idx].clone()).collect()
            };

            let candidates: Vec<(T, f64)> = snapshot
                .into_iter()
                .map(|item| {
                    let item_coord = self.codec.point_to_coordinate(item.x(), item.y());
                    let d = self.geodesy.distance(item_coord, coord);
                    (item, d)
                })
                .collect();

            if window_is_conclusive(&self.codec, self.geodesy.as_ref(), coord, query_point, half, &candidates) {
                return Ok(sort_by_distance(candidates));
            }
            half = widen_half(half, self.codec.order());
        }
    }
}
