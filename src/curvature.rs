//! Classification of turn radii into curvature levels.
//!
//! A segment whose radius falls under a level's `max_radius` contributes
//! `length * weight` to the curvature score. Levels are checked from the
//! tightest (level 4) to the broadest (level 1); anything broader is level 0
//! and contributes nothing.

use serde::Deserialize;

use crate::{
    errors::{Error, Result},
    geometry::STRAIGHT_RADIUS_M,
};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CurvatureLevel {
    pub max_radius: f64,
    pub weight: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CurvatureLevels {
    pub level_1: CurvatureLevel,
    pub level_2: CurvatureLevel,
    pub level_3: CurvatureLevel,
    pub level_4: CurvatureLevel,
}

impl Default for CurvatureLevels {
    fn default() -> Self {
        CurvatureLevels {
            level_1: CurvatureLevel { max_radius: 175.0, weight: 1.0 },
            level_2: CurvatureLevel { max_radius: 100.0, weight: 1.3 },
            level_3: CurvatureLevel { max_radius: 60.0, weight: 1.6 },
            level_4: CurvatureLevel { max_radius: 30.0, weight: 2.0 },
        }
    }
}

impl CurvatureLevels {
    fn tightest_first(&self) -> [(u8, &CurvatureLevel); 4] {
        [
            (4, &self.level_4),
            (3, &self.level_3),
            (2, &self.level_2),
            (1, &self.level_1),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let levels = [&self.level_1, &self.level_2, &self.level_3, &self.level_4];
        for (i, level) in levels.iter().enumerate() {
            if !(level.max_radius.is_finite() && level.max_radius > 0.0) {
                return Err(Error::config(format!(
                    "level_{} max_radius must be a positive number, got {}",
                    i + 1,
                    level.max_radius
                )));
            }
            if !(level.weight.is_finite() && level.weight >= 0.0) {
                return Err(Error::config(format!(
                    "level_{} weight must be a non-negative number, got {}",
                    i + 1,
                    level.weight
                )));
            }
        }
        // Straight and degenerate segments carry STRAIGHT_RADIUS_M and must stay level 0.
        if self.level_1.max_radius > STRAIGHT_RADIUS_M {
            return Err(Error::config(format!(
                "level_1 max_radius must not exceed the straight radius of {} m, got {}",
                STRAIGHT_RADIUS_M, self.level_1.max_radius
            )));
        }
        for pair in levels.windows(2) {
            if pair[1].max_radius >= pair[0].max_radius {
                return Err(Error::config(format!(
                    "curvature level radii must shrink from level 1 to level 4, got {} then {}",
                    pair[0].max_radius, pair[1].max_radius
                )));
            }
        }
        Ok(())
    }

    /// Level (0-4) and weight for a radius in meters.
    pub fn classify(&self, radius: f64) -> (u8, f64) {
        for (level, threshold) in self.tightest_first() {
            if radius < threshold.max_radius {
                return (level, threshold.weight);
            }
        }
        (0, 0.0)
    }

    /// Level and weighted curvature contribution of a segment.
    pub fn curvature_for_segment(&self, length: f64, radius: f64) -> (u8, f64) {
        let (level, weight) = self.classify(radius);
        (level, length * weight)
    }
}
