use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Radius of the earth in meters.
pub const EARTH_RADIUS_M: f64 = 6_373_000.0;

/// Radius assigned to anything that does not describe a proper turn: degenerate
/// triangles, collinear points and single-segment ways.
pub const STRAIGHT_RADIUS_M: f64 = 10_000.0;

/// Great-circle (haversine) distance in meters between two lat/lon pairs.
pub fn distance_on_earth(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing in radians, clockwise from north, in [0, 2π).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    y.atan2(x).rem_euclid(2.0 * PI)
}

/// Absolute difference between two bearings, wrapped into [0, π].
pub fn heading_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(2.0 * PI);
    if diff > PI {
        2.0 * PI - diff
    } else {
        diff
    }
}

/// Radius of the circle through the three corners of a triangle with side
/// lengths `a`, `b` and `c`.
///
/// Zero-length sides, collinear corners and any numeric underflow fall back to
/// [`STRAIGHT_RADIUS_M`]; the result never exceeds it.
pub fn circum_circle_radius(a: f64, b: f64, c: f64) -> f64 {
    if !(a > 0.0 && b > 0.0 && c > 0.0) {
        return STRAIGHT_RADIUS_M;
    }
    let divider = ((a + b + c) * (b + c - a) * (c + a - b) * (a + b - c)).abs().sqrt();
    if divider == 0.0 || !divider.is_finite() {
        return STRAIGHT_RADIUS_M;
    }
    let radius = (a * b * c) / divider;
    if radius.is_finite() {
        radius.min(STRAIGHT_RADIUS_M)
    } else {
        STRAIGHT_RADIUS_M
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn around(lat: f64, lon: f64) -> Self {
        BoundingBox {
            min_lat: lat,
            max_lat: lat,
            min_lon: lon,
            max_lon: lon,
        }
    }

    pub fn extend(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    pub fn validate(&self) -> Result<()> {
        let all_finite = [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(Error::config(format!("Invalid bounds {:?}", self)));
        }
        Ok(())
    }
}
