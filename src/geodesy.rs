//! Geodesy adapter (C6): the core's only dependency on great-circle math.
//!
//! [`Geodesy`] is an external contract, not part of the core algorithm —
//! the core consumes it through [`Envelope::buffer`]-style calls and never
//! assumes a particular ellipsoid model. [`WgsGeodesy`] is the bundled
//! default: a spherical-earth haversine implementation, grounded on
//! `nitrite_spatial::geometry::haversine_distance` but using the mean
//! radius `spec.md` specifies (`R = 6,371,000 m`) rather than the
//! teacher's more precise `6,371,008.8 m` WGS84 authalic radius.

use crate::envelope::Envelope;
use crate::grid::Coordinate;

/// Mean Earth radius in meters, per the literal value in the specification
/// this module implements. Differs intentionally from the more precise
/// WGS84 authalic radius used elsewhere in the ecosystem.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// External collaborator the core index depends on for all metric
/// geography: buffering a point by a radius into a searchable envelope,
/// measuring distance, and projecting a bearing move. Implementations must
/// be pure and safe to call from multiple threads concurrently.
pub trait Geodesy: Send + Sync {
    /// Every coordinate within `meters` of `coord` must lie inside the
    /// returned envelope. Across the antimeridian, or near a pole, the
    /// envelope may be widened beyond the tightest possible box — that is
    /// the core's only accepted over-approximation.
    fn buffer(&self, coord: Coordinate, meters: f64) -> Envelope;

    /// Great-circle distance between two coordinates, in meters.
    fn distance(&self, a: Coordinate, b: Coordinate) -> f64;

    /// The coordinate `meters` away from `coord` along `bearing_deg`
    /// (degrees clockwise from true north).
    fn move_point(&self, coord: Coordinate, meters: f64, bearing_deg: f64) -> Coordinate;
}

/// Spherical-earth geodesy using the haversine formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgsGeodesy;

impl Geodesy for WgsGeodesy {
    fn buffer(&self, coord: Coordinate, meters: f64) -> Envelope {
        let lat_rad = coord.lat.to_radians();
        let delta_lat = (meters / EARTH_RADIUS_METERS).to_degrees();

        // Near a pole the longitude buffer needed to stay correct diverges;
        // widen to the full range rather than produce a degenerate sliver.
        let cos_lat = lat_rad.cos();
        let delta_lon = if cos_lat.abs() < 1e-10 {
            180.0
        } else {
            (meters / (EARTH_RADIUS_METERS * cos_lat)).to_degrees()
        };

        let min_lon = coord.lon - delta_lon;
        let max_lon = coord.lon + delta_lon;

        // A buffer spanning more than the full circle, or wrapping past
        // +/-180, can't be expressed as a coherent lon interval: widen to
        // the whole world rather than silently drop coverage.
        let (min_lon, max_lon) = if delta_lon >= 180.0 || min_lon < -180.0 || max_lon > 180.0 {
            (-180.0, 180.0)
        } else {
            (min_lon, max_lon)
        };

        Envelope::new(
            min_lon,
            (coord.lat - delta_lat).max(-90.0),
            max_lon,
            (coord.lat + delta_lat).min(90.0),
        )
    }

    fn distance(&self, a: Coordinate, b: Coordinate) -> f64 {
        let lat1 = a.lat.to_radians();
        let lat2 = b.lat.to_radians();
        let delta_lat = (b.lat - a.lat).to_radians();
        let delta_lon = (b.lon - a.lon).to_radians();

        let h = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
    }

    fn move_point(&self, coord: Coordinate, meters: f64, bearing_deg: f64) -> Coordinate {
        let lat1 = coord.lat.to_radians();
        let lon1 = coord.lon.to_radians();
        let bearing = bearing_deg.to_radians();
        let angular_distance = meters / EARTH_RADIUS_METERS;

        let lat2 = (lat1.sin() * angular_distance.cos()
            + lat1.cos() * angular_distance.sin() * bearing.cos())
        .asin();
        let lon2 = lon1
            + (bearing.sin() * angular_distance.sin() * lat1.cos())
                .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

        Coordinate::new(lon2.to_degrees(), lat2.to_degrees()).normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_contains_the_center() {
        let geodesy = WgsGeodesy;
        let coord = Coordinate::new(18.0, 57.0);
        let envelope = geodesy.buffer(coord, 5_000.0);
        assert!(envelope.contains_point(coord));
    }

    #[test]
    fn buffer_near_pole_widens_to_full_longitude() {
        let geodesy = WgsGeodesy;
        let coord = Coordinate::new(0.0, 89.9999999);
        let envelope = geodesy.buffer(coord, 1_000.0);
        assert_eq!(envelope.min_x, -180.0);
        assert_eq!(envelope.max_x, 180.0);
    }

    #[test]
    fn distance_is_zero_for_identical_points() {
        let geodesy = WgsGeodesy;
        let coord = Coordinate::new(10.0, 20.0);
        assert!(geodesy.distance(coord, coord) < 1e-6);
    }

    #[test]
    fn distance_roughly_matches_known_reference() {
        // London to Paris, ~343 km great-circle.
        let geodesy = WgsGeodesy;
        let london = Coordinate::new(-0.1278, 51.5074);
        let paris = Coordinate::new(2.3522, 48.8566);
        let d = geodesy.distance(london, paris);
        assert!((300_000.0..400_000.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn move_point_round_trips_distance() {
        let geodesy = WgsGeodesy;
        let start = Coordinate::new(10.0, 45.0);
        let moved = geodesy.move_point(start, 10_000.0, 90.0);
        let d = geodesy.distance(start, moved);
        assert!((d - 10_000.0).abs() < 10.0, "distance was {d}");
    }
}
