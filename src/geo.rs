//! Distance helpers
//!
//! Exact lengths use the haversine formula from the `geo` crate. Snapping compares
//! candidates with a cheaper equirectangular projection ("normalized" distances), which is
//! only meaningful relative to other normalized distances.

use ::geo::{Distance, Haversine, Point};

use crate::point_list::PointList;

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    Haversine::distance(p1, p2)
}

/// Length of a polyline in metres
pub fn point_list_length(points: &PointList) -> f64 {
    let mut total = 0.0;
    for i in 1..points.len() {
        total += haversine_distance(
            points.lat(i - 1),
            points.lon(i - 1),
            points.lat(i),
            points.lon(i),
        );
    }
    total
}

#[inline]
fn shrink_factor(lat1: f64, lat2: f64) -> f64 {
    ((lat1 + lat2) / 2.0).to_radians().cos()
}

/// Squared planar distance in radians², monotone in the real distance over short ranges
pub fn calc_normalized_dist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians() * shrink_factor(lat1, lat2);
    dlat * dlat + dlon * dlon
}

/// True if the perpendicular from `r` onto segment `a`-`b` lands strictly inside it
pub fn valid_edge_distance(
    r_lat: f64,
    r_lon: f64,
    a_lat: f64,
    a_lon: f64,
    b_lat: f64,
    b_lon: f64,
) -> bool {
    let shrink = shrink_factor(a_lat, b_lat);
    let (ax, ay) = (a_lon * shrink, a_lat);
    let (bx, by) = (b_lon * shrink, b_lat);
    let (rx, ry) = (r_lon * shrink, r_lat);

    let (ab_x, ab_y) = (bx - ax, by - ay);
    let ar = (rx - ax) * ab_x + (ry - ay) * ab_y;
    let rb = (bx - rx) * ab_x + (by - ry) * ab_y;
    ar > 0.0 && rb > 0.0
}

/// Foot of the perpendicular from `r` onto the line through `a` and `b`
pub fn calc_crossing_point_to_edge(
    r_lat: f64,
    r_lon: f64,
    a_lat: f64,
    a_lon: f64,
    b_lat: f64,
    b_lon: f64,
) -> (f64, f64) {
    let shrink = shrink_factor(a_lat, b_lat);
    let (ax, ay) = (a_lon * shrink, a_lat);
    let (bx, by) = (b_lon * shrink, b_lat);
    let (rx, ry) = (r_lon * shrink, r_lat);

    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (a_lat, a_lon);
    }
    let t = ((rx - ax) * dx + (ry - ay) * dy) / len_sq;
    let lat = ay + t * dy;
    let lon = (ax + t * dx) / shrink;
    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine() {
        // One degree of latitude is ~111.2 km
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
        assert_eq!(haversine_distance(50.0, 4.0, 50.0, 4.0), 0.0);
    }

    #[test]
    fn test_crossing_point() {
        let (lat, lon) = calc_crossing_point_to_edge(0.001, 0.5, 0.0, 0.0, 0.0, 1.0);
        assert!(lat.abs() < 1e-12);
        assert!((lon - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_valid_edge_distance() {
        assert!(valid_edge_distance(0.001, 0.5, 0.0, 0.0, 0.0, 1.0));
        assert!(!valid_edge_distance(0.001, 1.5, 0.0, 0.0, 0.0, 1.0));
        assert!(!valid_edge_distance(0.001, -0.1, 0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_normalized_distance_orders_like_haversine() {
        let near = calc_normalized_dist(50.0, 4.0, 50.001, 4.0);
        let far = calc_normalized_dist(50.0, 4.0, 50.0, 4.01);
        assert!(near < far);
    }

    #[test]
    fn test_point_list_length() {
        let points = PointList::from_coords(&[(0.0, 0.0), (0.0, 0.5), (0.0, 1.0)]);
        let total = point_list_length(&points);
        assert!((total - haversine_distance(0.0, 0.0, 0.0, 1.0)).abs() < 1e-6);
    }
}
