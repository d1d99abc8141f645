//! # Great-circle distance and arrival estimate.
//!
//! Pure functions, no state. Distance uses the haversine formula on a sphere
//! of radius [`EARTH_RADIUS_KM`].
//!
//! ```text
//! a = sin²(Δφ/2) + cos φ1 · cos φ2 · sin²(Δλ/2)
//! d = 2R · asin(√a)
//! eta = round(d / speed · 60)   (None when d rounds to 0.00 km)
//! ```
//!
//! # Example
//! ```
//! use trackvisor::{Position, eta};
//!
//! let tech = Position::at(12.6392, -8.0029).unwrap();
//! let client = Position::at(12.6500, -8.0000).unwrap();
//! let est = eta::estimate(&tech, &client, 30.0);
//! assert!((est.distance_km - 1.25).abs() < 0.05);
//! assert!(est.eta_minutes.is_some());
//! ```

use crate::geo::Position;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default assumed ground speed for urban travel (km/h).
pub const DEFAULT_SPEED_KMH: f64 = 30.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Result of [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Great-circle distance in kilometres.
    pub distance_km: f64,
    /// Whole minutes to arrival; `None` when already arrived or speed is unusable.
    pub eta_minutes: Option<u32>,
}

/// Great-circle distance between two positions in kilometres.
pub fn distance_km(from: &Position, to: &Position) -> f64 {
    haversine_km(from.coords(), to.coords())
}

/// Estimates distance and arrival time at `speed_kmh`.
///
/// `eta_minutes` is `None` when the distance rounds to `0.00` km or the
/// arrival time rounds to zero minutes, or when `speed_kmh` is not a positive
/// finite number.
pub fn estimate(from: &Position, to: &Position, speed_kmh: f64) -> Estimate {
    let distance_km = distance_km(from, to);
    let arrived = (distance_km * 100.0).round() == 0.0;

    let eta_minutes = if arrived || !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        None
    } else {
        let minutes = (distance_km / speed_kmh * 60.0).round();
        // Zero minutes reads as "arrived", not as an estimate.
        (minutes >= 1.0).then(|| minutes.min(f64::from(u32::MAX)) as u32)
    };

    Estimate {
        distance_km,
        eta_minutes,
    }
}

fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Clamp guards asin against a > 1 from rounding near antipodes.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> Position {
        Position::at(lat, lng).unwrap()
    }

    #[test]
    fn bamako_fixture() {
        let a = p(12.6392, -8.0029);
        let b = p(12.6500, -8.0000);
        let est = estimate(&a, &b, 30.0);

        assert!(
            (est.distance_km - 1.25).abs() < 0.05,
            "distance {} not ≈ 1.25km",
            est.distance_km
        );
        assert_eq!(est.eta_minutes, Some(2));
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((12.6392, -8.0029), (12.6500, -8.0000)),
            ((48.8566, 2.3522), (40.7128, -74.0060)),
            ((-33.8688, 151.2093), (35.6762, 139.6503)),
            ((89.9, 179.9), (-89.9, -179.9)),
            ((0.0, 0.0), (0.0, 180.0)),
        ];
        for (x, y) in pairs {
            let a = p(x.0, x.1);
            let b = p(y.0, y.1);
            assert_eq!(
                estimate(&a, &b, 30.0).distance_km,
                estimate(&b, &a, 30.0).distance_km,
                "asymmetric for {x:?} / {y:?}"
            );
        }
    }

    #[test]
    fn same_point_has_no_eta() {
        let a = p(12.6392, -8.0029);
        let est = estimate(&a, &a, 30.0);
        assert_eq!(est.distance_km, 0.0);
        assert_eq!(est.eta_minutes, None);
    }

    #[test]
    fn a_few_metres_counts_as_arrived() {
        // ~1.1m apart.
        let est = estimate(&p(0.0, 0.0), &p(0.00001, 0.0), 30.0);
        assert!(est.distance_km > 0.0);
        assert_eq!(est.eta_minutes, None);
    }

    #[test]
    fn zero_minute_eta_counts_as_arrived() {
        // ~6.7m: rounds to 0.01km but to 0 minutes at 30km/h.
        let est = estimate(&p(0.0, 0.0), &p(0.00006, 0.0), 30.0);
        assert!((est.distance_km * 100.0).round() >= 1.0);
        assert_eq!(est.eta_minutes, None);

        // ~500m is the first whole minute.
        let est = estimate(&p(0.0, 0.0), &p(0.0045, 0.0), 30.0);
        assert_eq!(est.eta_minutes, Some(1));
    }

    #[test]
    fn unusable_speed_has_no_eta() {
        let a = p(0.0, 0.0);
        let b = p(1.0, 0.0);
        assert_eq!(estimate(&a, &b, 0.0).eta_minutes, None);
        assert_eq!(estimate(&a, &b, -5.0).eta_minutes, None);
        assert_eq!(estimate(&a, &b, f64::NAN).eta_minutes, None);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_km(&p(0.0, 0.0), &p(1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = distance_km(&p(0.0, 0.0), &p(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
