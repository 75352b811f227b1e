use crate::models::{BoundingBox, Coordinates, LongitudeSpan};

/// Earth's radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack added to each bound so points exactly on the circle survive rounding
const BOUND_SLACK_DEG: f64 = 1e-9;

/// Great-circle distance between two points in kilometers (haversine)
///
/// Inputs are degrees and are expected to be validated by the caller.
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // rounding can push `a` marginally past 1 for antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance between two coordinate pairs in kilometers
#[inline]
pub fn distance_between(from: Coordinates, to: Coordinates) -> f64 {
    haversine_distance(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Bounding box enclosing every point within `radius_km` of a center point.
///
/// The latitude half-width is the angular radius. The longitude half-width is
/// `asin(sin(r/R) / cos(lat))`, the widest longitude reached by the circle.
/// When the circle reaches a pole there is no longitude bound; when it
/// crosses the antimeridian the span wraps.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let angular = radius_km.max(0.0) / EARTH_RADIUS_KM;
    let lat_delta = angular.to_degrees() + BOUND_SLACK_DEG;

    let min_lat = lat - lat_delta;
    let max_lat = lat + lat_delta;
    if min_lat <= -90.0 || max_lat >= 90.0 || angular.sin() >= lat.to_radians().cos() {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            longitude: LongitudeSpan::Any,
        };
    }

    let lon_delta = (angular.sin() / lat.to_radians().cos()).asin().to_degrees() + BOUND_SLACK_DEG;
    let min_lon = lon - lon_delta;
    let max_lon = lon + lon_delta;

    let longitude = if min_lon < -180.0 {
        LongitudeSpan::Wrapped { min: min_lon + 360.0, max: max_lon }
    } else if max_lon > 180.0 {
        LongitudeSpan::Wrapped { min: min_lon, max: max_lon - 360.0 }
    } else {
        LongitudeSpan::Range { min: min_lon, max: max_lon }
    };

    BoundingBox { min_lat, max_lat, longitude }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && bbox.longitude.contains(lon)
}
