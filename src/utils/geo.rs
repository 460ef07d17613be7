// src/utils/geo.rs
use crate::errors::DispatchError;

/// Mean Earth radius in kilometers. Spherical approximation is deliberate:
/// matching and pricing only need hundred-meter accuracy.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates using the haversine formula.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Destination point from a start coordinate, an initial bearing in degrees
/// and a distance in kilometers. Used to build candidate pickup rings.
pub fn destination_point(lat: f64, lon: f64, bearing_deg: f64, distance_km: f64) -> (f64, f64) {
    let angular = distance_km / EARTH_RADIUS_KM;
    let bearing = bearing_deg.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let lat2 =
        (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), normalize_lon(lon2.to_degrees()))
}

fn normalize_lon(lon: f64) -> f64 {
    let mut lon = lon;
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Reject coordinates outside the WGS84 domain before they enter any store.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), DispatchError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(DispatchError::validation_error(
            "latitude",
            format!("latitude out of range: {}", lat),
        ));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(DispatchError::validation_error(
            "longitude",
            format!("longitude out of range: {}", lon),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_symmetric() {
        let d1 = haversine_km(40.7128, -74.0060, 40.7589, -73.9851);
        let d2 = haversine_km(40.7589, -73.9851, 40.7128, -74.0060);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn haversine_known_distance() {
        // Times Square to downtown Manhattan, roughly 5.4 km
        let d = haversine_km(40.7128, -74.0060, 40.7589, -73.9851);
        assert!(d > 4.5 && d < 6.5, "unexpected distance: {}", d);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_km(5.6037, -0.1870, 5.6037, -0.1870) < 1e-9);
    }

    #[test]
    fn destination_point_lands_at_requested_distance() {
        let (lat, lon) = destination_point(40.7128, -74.0060, 90.0, 0.2);
        let d = haversine_km(40.7128, -74.0060, lat, lon);
        assert!((d - 0.2).abs() < 0.001, "expected ~200m, got {} km", d);
    }

    #[test]
    fn coordinate_validation() {
        assert!(validate_coordinates(40.0, -74.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }
}
