use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::{
    collector::CollectorConfig,
    curvature::CurvatureLevels,
    errors::{Error, Result},
    geometry::BoundingBox,
    pipeline::{
        adjust::{
            InflateCurvatureForTaggedWays, InflateCurvatureNearTaggedNodes, InflateCurvatureNearWayTagChange,
            SquashCurvatureForTaggedWays, SquashCurvatureNearTaggedNodes, SquashCurvatureNearWayTagChange,
        },
        bounds::{AddBoundingBox, FilterCollectionsByBounds},
        curvature::AddSegmentCurvature,
        deflections::FilterSegmentDeflections,
        filters::{FilterCollectionsByCurvature, FilterCollectionsByLength, FilterCollectionsByNumWays},
        radius::AddSegmentRadius,
        roll_up::{RollUpCurvature, RollUpLength},
        segments::AddSegments,
        sort::{Head, SortCollectionsBySum, SortDirection, SortKey},
        split_straight::{SplitCollectionsOnStraightSegments, DEFAULT_THRESHOLD_M},
        tags::{FilterOnlyWaysWithTag, FilterOutWaysWithTag, SplitCollectionsOnTag},
        validate::Validate,
        Pipeline, Stage,
    },
};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

const UNPAVED_SURFACES: &[&str] = &[
    "unpaved", "dirt", "gravel", "fine_gravel", "sand", "grass", "ground", "pebblestone", "mud", "clay", "dirt/sand",
    "soil",
];

const SERVICE_TYPES: &[&str] = &["driveway", "parking_aisle", "drive-through", "parking", "bus", "emergency_access"];

fn default_true() -> bool {
    true
}

fn default_inflation() -> f64 {
    1.0
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// One entry of the `pipeline` list, tagged by its `"stage"` name.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    AddSegments,
    AddSegmentRadius,
    AddSegmentCurvature,
    FilterSegmentDeflections {
        #[serde(default)]
        keep_eliminated: bool,
    },
    SplitCollectionsOnStraightSegments {
        /// Defaults to the top-level `straight_segment_split_threshold`.
        length: Option<f64>,
        #[serde(default = "default_true")]
        emit_straight_sections: bool,
    },
    RollUpLength {
        #[serde(default = "default_true")]
        ways: bool,
        #[serde(default = "default_true")]
        collections: bool,
    },
    RollUpCurvature {
        #[serde(default = "default_true")]
        ways: bool,
        #[serde(default = "default_true")]
        collections: bool,
    },
    AddBoundingBox,
    FilterCollectionsByCurvature {
        min: Option<f64>,
        max: Option<f64>,
    },
    FilterCollectionsByLength {
        min: Option<f64>,
        max: Option<f64>,
    },
    FilterCollectionsByNumWays {
        min: Option<usize>,
        max: Option<usize>,
    },
    FilterCollectionsByBounds {
        /// Defaults to the top-level `bounds`.
        bounds: Option<BoundingBox>,
    },
    FilterOutWaysWithTag {
        tag: String,
        values: Vec<String>,
        #[serde(default)]
        filter_out_ways_missing_tag: bool,
    },
    FilterOnlyWaysWithTag {
        tag: String,
        values: Vec<String>,
        #[serde(default)]
        skip_ways_missing_tag: bool,
    },
    SplitCollectionsOnTag {
        tag: String,
        group: Vec<String>,
        #[serde(default)]
        exclude_ways_missing_tag: bool,
    },
    SquashCurvatureForTaggedWays {
        tag: String,
        values: Option<Vec<String>>,
    },
    InflateCurvatureForTaggedWays {
        tag: String,
        values: Option<Vec<String>>,
        #[serde(default = "default_inflation")]
        curvature: f64,
    },
    /// The tag must be one the collector keeps on nodes.
    SquashCurvatureNearTaggedNodes {
        tag: String,
        values: Option<Vec<String>>,
        distance: f64,
    },
    InflateCurvatureNearTaggedNodes {
        tag: String,
        values: Option<Vec<String>>,
        distance: f64,
        #[serde(default = "default_inflation")]
        curvature: f64,
    },
    SquashCurvatureNearWayTagChange {
        tag: String,
        /// Values other than these count as the tag being unset.
        only_values: Option<Vec<String>>,
        #[serde(default)]
        ignored_values: Vec<String>,
        distance: f64,
    },
    InflateCurvatureNearWayTagChange {
        tag: String,
        only_values: Option<Vec<String>>,
        #[serde(default)]
        ignored_values: Vec<String>,
        distance: f64,
        #[serde(default = "default_inflation")]
        curvature: f64,
    },
    SortCollectionsBySum {
        key: SortKey,
        #[serde(default)]
        direction: SortDirection,
    },
    Head {
        n: usize,
    },
    Validate,
}

fn check_range<T: PartialOrd + std::fmt::Debug>(stage: &str, min: Option<T>, max: Option<T>) -> Result<()> {
    if let (Some(min), Some(max)) = (&min, &max) {
        if min > max {
            return Err(Error::config(format!("{}: min {:?} is greater than max {:?}", stage, min, max)));
        }
    }
    Ok(())
}

fn check_tag(stage: &str, tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::config(format!("{}: tag must not be empty", stage)));
    }
    Ok(())
}

fn check_positive(stage: &str, name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::config(format!("{}: {} must be greater than 0, got {}", stage, name, value)));
    }
    Ok(())
}

/// Node tags are only available for matching when the collector keeps them.
fn check_node_tag(stage: &str, tag: &str, config: &Config) -> Result<()> {
    check_tag(stage, tag)?;
    if !config.collector.node_tags.iter().any(|kept| kept == tag) {
        return Err(Error::config(format!(
            "{}: node tag {} is not in collector.node_tags ({})",
            stage,
            tag,
            config.collector.node_tags.join(", ")
        )));
    }
    Ok(())
}

impl StageConfig {
    /// Construct the stage, filling unset options from the top-level config.
    pub fn build(&self, config: &Config) -> Result<Box<dyn Stage>> {
        let stage: Box<dyn Stage> = match self {
            StageConfig::AddSegments => Box::new(AddSegments),
            StageConfig::AddSegmentRadius => Box::new(AddSegmentRadius),
            StageConfig::AddSegmentCurvature => Box::new(AddSegmentCurvature::new(config.curvature_levels.clone())),
            StageConfig::FilterSegmentDeflections { keep_eliminated } => Box::new(FilterSegmentDeflections::new(
                config.curvature_levels.level_1.max_radius,
                *keep_eliminated,
            )),
            StageConfig::SplitCollectionsOnStraightSegments {
                length,
                emit_straight_sections,
            } => Box::new(SplitCollectionsOnStraightSegments::new(
                length.unwrap_or(config.straight_segment_split_threshold),
                *emit_straight_sections,
            )?),
            StageConfig::RollUpLength { ways, collections } => {
                if !ways && !collections {
                    return Err(Error::config("roll_up_length: cannot skip both ways and collections"));
                }
                Box::new(RollUpLength::new(*ways, *collections))
            }
            StageConfig::RollUpCurvature { ways, collections } => {
                if !ways && !collections {
                    return Err(Error::config("roll_up_curvature: cannot skip both ways and collections"));
                }
                Box::new(RollUpCurvature::new(*ways, *collections))
            }
            StageConfig::AddBoundingBox => Box::new(AddBoundingBox),
            StageConfig::FilterCollectionsByCurvature { min, max } => {
                check_range(FilterCollectionsByCurvature::STAGE_NAME, *min, *max)?;
                Box::new(FilterCollectionsByCurvature::new(*min, *max))
            }
            StageConfig::FilterCollectionsByLength { min, max } => {
                check_range(FilterCollectionsByLength::STAGE_NAME, *min, *max)?;
                Box::new(FilterCollectionsByLength::new(*min, *max))
            }
            StageConfig::FilterCollectionsByNumWays { min, max } => {
                check_range(FilterCollectionsByNumWays::STAGE_NAME, *min, *max)?;
                Box::new(FilterCollectionsByNumWays::new(*min, *max))
            }
            StageConfig::FilterCollectionsByBounds { bounds } => {
                let area = bounds.or(config.bounds).ok_or_else(|| {
                    Error::config("filter_collections_by_bounds: no bounds given here or at the top level")
                })?;
                area.validate()?;
                Box::new(FilterCollectionsByBounds::new(area))
            }
            StageConfig::FilterOutWaysWithTag {
                tag,
                values,
                filter_out_ways_missing_tag,
            } => {
                check_tag(FilterOutWaysWithTag::STAGE_NAME, tag)?;
                Box::new(FilterOutWaysWithTag::new(tag.clone(), values.clone(), *filter_out_ways_missing_tag))
            }
            StageConfig::FilterOnlyWaysWithTag {
                tag,
                values,
                skip_ways_missing_tag,
            } => {
                check_tag(FilterOnlyWaysWithTag::STAGE_NAME, tag)?;
                Box::new(FilterOnlyWaysWithTag::new(tag.clone(), values.clone(), *skip_ways_missing_tag))
            }
            StageConfig::SplitCollectionsOnTag {
                tag,
                group,
                exclude_ways_missing_tag,
            } => {
                check_tag(SplitCollectionsOnTag::STAGE_NAME, tag)?;
                Box::new(SplitCollectionsOnTag::new(tag.clone(), group.clone(), *exclude_ways_missing_tag))
            }
            StageConfig::SquashCurvatureForTaggedWays { tag, values } => {
                check_tag(SquashCurvatureForTaggedWays::STAGE_NAME, tag)?;
                Box::new(SquashCurvatureForTaggedWays::new(tag.clone(), values.clone()))
            }
            StageConfig::InflateCurvatureForTaggedWays { tag, values, curvature } => {
                let name = InflateCurvatureForTaggedWays::STAGE_NAME;
                check_tag(name, tag)?;
                check_positive(name, "curvature", *curvature)?;
                Box::new(InflateCurvatureForTaggedWays::new(tag.clone(), values.clone(), *curvature))
            }
            StageConfig::SquashCurvatureNearTaggedNodes { tag, values, distance } => {
                let name = SquashCurvatureNearTaggedNodes::STAGE_NAME;
                check_node_tag(name, tag, config)?;
                check_positive(name, "distance", *distance)?;
                Box::new(SquashCurvatureNearTaggedNodes::new(tag.clone(), values.clone(), *distance))
            }
            StageConfig::InflateCurvatureNearTaggedNodes {
                tag,
                values,
                distance,
                curvature,
            } => {
                let name = InflateCurvatureNearTaggedNodes::STAGE_NAME;
                check_node_tag(name, tag, config)?;
                check_positive(name, "distance", *distance)?;
                check_positive(name, "curvature", *curvature)?;
                Box::new(InflateCurvatureNearTaggedNodes::new(
                    tag.clone(),
                    values.clone(),
                    *distance,
                    *curvature,
                ))
            }
            StageConfig::SquashCurvatureNearWayTagChange {
                tag,
                only_values,
                ignored_values,
                distance,
            } => {
                let name = SquashCurvatureNearWayTagChange::STAGE_NAME;
                check_tag(name, tag)?;
                check_positive(name, "distance", *distance)?;
                Box::new(SquashCurvatureNearWayTagChange::new(
                    tag.clone(),
                    only_values.clone(),
                    ignored_values.clone(),
                    *distance,
                ))
            }
            StageConfig::InflateCurvatureNearWayTagChange {
                tag,
                only_values,
                ignored_values,
                distance,
                curvature,
            } => {
                let name = InflateCurvatureNearWayTagChange::STAGE_NAME;
                check_tag(name, tag)?;
                check_positive(name, "distance", *distance)?;
                check_positive(name, "curvature", *curvature)?;
                Box::new(InflateCurvatureNearWayTagChange::new(
                    tag.clone(),
                    only_values.clone(),
                    ignored_values.clone(),
                    *distance,
                    *curvature,
                ))
            }
            StageConfig::SortCollectionsBySum { key, direction } => Box::new(SortCollectionsBySum::new(*key, *direction)),
            StageConfig::Head { n } => Box::new(Head::new(*n)),
            StageConfig::Validate => Box::new(Validate),
        };
        Ok(stage)
    }
}

/// Stages run when the config does not list its own.
pub fn default_pipeline(with_bounds: bool) -> Vec<StageConfig> {
    let mut stages = vec![
        StageConfig::FilterOutWaysWithTag {
            tag: "surface".to_string(),
            values: strings(UNPAVED_SURFACES),
            filter_out_ways_missing_tag: false,
        },
        StageConfig::FilterOutWaysWithTag {
            tag: "service".to_string(),
            values: strings(SERVICE_TYPES),
            filter_out_ways_missing_tag: false,
        },
        StageConfig::AddSegments,
        StageConfig::AddSegmentRadius,
        StageConfig::AddSegmentCurvature,
        StageConfig::FilterSegmentDeflections { keep_eliminated: false },
        StageConfig::SplitCollectionsOnStraightSegments {
            length: None,
            emit_straight_sections: true,
        },
        StageConfig::RollUpLength {
            ways: true,
            collections: true,
        },
        StageConfig::RollUpCurvature {
            ways: true,
            collections: true,
        },
        StageConfig::AddBoundingBox,
    ];
    if with_bounds {
        stages.push(StageConfig::FilterCollectionsByBounds { bounds: None });
    }
    stages.push(StageConfig::FilterCollectionsByCurvature {
        min: Some(300.0),
        max: None,
    });
    stages.push(StageConfig::SortCollectionsBySum {
        key: SortKey::Curvature,
        direction: SortDirection::Descending,
    });
    stages
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_M
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// OSM XML file, optionally `.xz` compressed.
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Recompute even when the output file already exists.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub curvature_levels: CurvatureLevels,
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    #[serde(default = "default_threshold")]
    pub straight_segment_split_threshold: f64,
    #[serde(default)]
    pub pipeline: Option<Vec<StageConfig>>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .map_err(|err| Error::config(format!("Could not open config file {}: {}", path.display(), err)))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_path.is_empty() {
            return Err(Error::config("data_path must not be empty"));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::config(format!(
                "log_level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        self.curvature_levels.validate()?;
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        if !(self.straight_segment_split_threshold.is_finite() && self.straight_segment_split_threshold > 0.0) {
            return Err(Error::config(format!(
                "straight_segment_split_threshold must be greater than 0, got {}",
                self.straight_segment_split_threshold
            )));
        }
        Ok(())
    }

    pub fn stage_configs(&self) -> Vec<StageConfig> {
        match &self.pipeline {
            Some(stages) => stages.clone(),
            None => default_pipeline(self.bounds.is_some()),
        }
    }

    /// Build every configured stage and check that their fields line up.
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let stages = self
            .stage_configs()
            .iter()
            .map(|stage| stage.build(self))
            .collect::<Result<Vec<_>>>()?;
        Pipeline::new(stages)
    }
}
