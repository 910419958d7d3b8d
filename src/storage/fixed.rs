//! Fixed-point encodings shared by the stores

use roadgraph_common::{Error, Result};

/// Coordinates are stored in 1e-7 degrees
pub const DEGREE_SCALE: f64 = 10_000_000.0;

/// Elevation, distance, weight and turn cost are stored in 1/1000 units
pub const MILLI_SCALE: f64 = 1000.0;

/// Largest storable distance in metres
pub const MAX_DISTANCE_METERS: f64 = i32::MAX as f64 / MILLI_SCALE;

/// Stored turn cost meaning "forbidden"
pub const INFINITE_TURN_COST: i32 = i32::MAX;

#[inline]
pub fn degree_to_int(degree: f64) -> i32 {
    (degree * DEGREE_SCALE).round() as i32
}

#[inline]
pub fn int_to_degree(value: i32) -> f64 {
    value as f64 / DEGREE_SCALE
}

#[inline]
pub fn ele_to_int(ele: f64) -> i32 {
    (ele * MILLI_SCALE).round() as i32
}

#[inline]
pub fn int_to_ele(value: i32) -> f64 {
    value as f64 / MILLI_SCALE
}

/// Encode a distance, saturating at `max_mm`.
///
/// Returns the stored value and whether it was saturated.
pub fn distance_to_int(meters: f64, max_mm: i32) -> Result<(i32, bool)> {
    if meters.is_nan() || meters < 0.0 {
        return Err(Error::InvalidValue {
            what: "distance",
            value: meters,
        });
    }
    let scaled = (meters * MILLI_SCALE).round();
    if scaled >= max_mm as f64 {
        return Ok((max_mm, true));
    }
    Ok((scaled as i32, false))
}

#[inline]
pub fn int_to_distance(value: i32) -> f64 {
    value as f64 / MILLI_SCALE
}

/// Encode a turn cost; `f64::INFINITY` marks a forbidden turn
pub fn turn_cost_to_int(cost: f64) -> Result<i32> {
    if cost.is_nan() || cost < 0.0 {
        return Err(Error::InvalidValue {
            what: "turn cost",
            value: cost,
        });
    }
    if cost.is_infinite() {
        return Ok(INFINITE_TURN_COST);
    }
    let scaled = (cost * MILLI_SCALE).round();
    Ok(scaled.min((INFINITE_TURN_COST - 1) as f64) as i32)
}

#[inline]
pub fn int_to_turn_cost(value: i32) -> f64 {
    if value == INFINITE_TURN_COST {
        f64::INFINITY
    } else {
        value as f64 / MILLI_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees() {
        assert_eq!(degree_to_int(50.8503396), 508_503_396);
        assert!((int_to_degree(degree_to_int(-4.3517103)) + 4.3517103).abs() < 1e-7);
    }

    #[test]
    fn test_distance_saturates() {
        let max = i32::MAX;
        assert_eq!(distance_to_int(1.2345, max).unwrap(), (1235, false));
        assert_eq!(distance_to_int(3_000_000.0, max).unwrap(), (max, true));
        assert_eq!(distance_to_int(10.0, 5_000).unwrap(), (5_000, true));
        assert!(distance_to_int(-0.5, max).is_err());
        assert!(distance_to_int(f64::NAN, max).is_err());
    }

    #[test]
    fn test_turn_costs() {
        assert_eq!(turn_cost_to_int(f64::INFINITY).unwrap(), INFINITE_TURN_COST);
        assert_eq!(int_to_turn_cost(INFINITE_TURN_COST), f64::INFINITY);
        assert_eq!(int_to_turn_cost(turn_cost_to_int(2.5).unwrap()), 2.5);
        assert!(turn_cost_to_int(1e12).unwrap() < INFINITE_TURN_COST);
        assert!(turn_cost_to_int(-1.0).is_err());
    }
}
