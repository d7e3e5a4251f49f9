//! Streaming post-processing of collections.
//!
//! A [`Stage`] turns a lazy stream of collections into another lazy stream.
//! Each stage declares the fields it needs and the fields it fills in, so a
//! [`Pipeline`] can refuse an impossible ordering before any data flows.

pub mod adjust;
pub mod bounds;
pub mod curvature;
pub mod deflections;
pub mod filters;
pub mod radius;
pub mod roll_up;
pub mod segments;
pub mod sort;
pub mod split_straight;
pub mod tags;
pub mod traversal;
pub mod validate;

use std::{collections::HashSet, fmt};

use log::{debug, info};

use crate::{
    data::Collection,
    errors::{Error, Result},
};

pub type CollectionStream<'a> = Box<dyn Iterator<Item = Result<Collection>> + 'a>;

/// Optional data that stages add to collections, ways and segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Segments,
    SegmentRadius,
    SegmentCurvature,
    WayLength,
    WayCurvature,
    CollectionLength,
    CollectionCurvature,
    BoundingBox,
}

pub const ROLLED_UP_FIELDS: &[Field] = &[
    Field::WayLength,
    Field::WayCurvature,
    Field::CollectionLength,
    Field::CollectionCurvature,
    Field::BoundingBox,
];

/// Roll-ups that describe a collection as a whole. Splitters that keep ways
/// intact only invalidate these.
pub const COLLECTION_ROLL_UPS: &[Field] = &[
    Field::CollectionLength,
    Field::CollectionCurvature,
    Field::BoundingBox,
];

impl Field {
    /// Name of the stage that fills this field in.
    pub fn producer(&self) -> &'static str {
        match self {
            Field::Segments => segments::AddSegments::STAGE_NAME,
            Field::SegmentRadius => radius::AddSegmentRadius::STAGE_NAME,
            Field::SegmentCurvature => curvature::AddSegmentCurvature::STAGE_NAME,
            Field::WayLength | Field::CollectionLength => roll_up::RollUpLength::STAGE_NAME,
            Field::WayCurvature | Field::CollectionCurvature => roll_up::RollUpCurvature::STAGE_NAME,
            Field::BoundingBox => bounds::AddBoundingBox::STAGE_NAME,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Segments => "way segments",
            Field::SegmentRadius => "segment radius",
            Field::SegmentCurvature => "segment curvature",
            Field::WayLength => "way length",
            Field::WayCurvature => "way curvature",
            Field::CollectionLength => "collection length",
            Field::CollectionCurvature => "collection curvature",
            Field::BoundingBox => "collection bounding box",
        };
        f.write_str(name)
    }
}

pub trait Stage {
    fn name(&self) -> &'static str;

    fn requires(&self) -> &'static [Field] {
        &[]
    }

    fn produces(&self) -> &'static [Field] {
        &[]
    }

    /// Fields that no longer hold once this stage has run, e.g. roll-ups of
    /// collections that a splitter cut apart.
    fn invalidates(&self) -> &'static [Field] {
        &[]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        Pipeline::with_initial_fields(stages, &[])
    }

    /// Build a pipeline for input that already carries `initial` fields.
    pub fn with_initial_fields(stages: Vec<Box<dyn Stage>>, initial: &[Field]) -> Result<Self> {
        let mut available: HashSet<Field> = initial.iter().copied().collect();
        for stage in &stages {
            for field in stage.requires() {
                if !available.contains(field) {
                    return Err(Error::missing_field(stage.name(), *field));
                }
            }
            for field in stage.invalidates() {
                available.remove(field);
            }
            available.extend(stage.produces().iter().copied());
            debug!(stage = stage.name(); "Pipeline stage accepted");
        }
        info!(stages = stages.len(); "Pipeline assembled");
        Ok(Pipeline { stages })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Chain every stage over `input`. Nothing is pulled until the returned
    /// stream is iterated.
    pub fn run<'a, I>(&'a self, input: I) -> CollectionStream<'a>
    where
        I: IntoIterator<Item = Collection>,
        I::IntoIter: 'a,
    {
        let source: CollectionStream<'a> = Box::new(input.into_iter().map(Ok));
        self.stages
            .iter()
            .fold(source, |stream, stage| stage.process(stream))
    }
}

/// Apply `f` to every collection, passing errors through.
pub(crate) fn map_each<'a, F>(input: CollectionStream<'a>, mut f: F) -> CollectionStream<'a>
where
    F: FnMut(Collection) -> Result<Collection> + 'a,
{
    Box::new(input.map(move |item| item.and_then(&mut f)))
}

/// Keep the collections for which `keep` returns true.
pub(crate) fn filter_each<'a, F>(input: CollectionStream<'a>, mut keep: F) -> CollectionStream<'a>
where
    F: FnMut(&Collection) -> Result<bool> + 'a,
{
    Box::new(input.filter_map(move |item| match item {
        Ok(collection) => match keep(&collection) {
            Ok(true) => Some(Ok(collection)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        },
        Err(err) => Some(Err(err)),
    }))
}

/// Replace every collection with zero or more collections.
pub(crate) fn split_each<'a, F>(input: CollectionStream<'a>, mut split: F) -> CollectionStream<'a>
where
    F: FnMut(Collection) -> Result<Vec<Collection>> + 'a,
{
    Box::new(input.flat_map(move |item| {
        let out: Vec<Result<Collection>> = match item.and_then(&mut split) {
            Ok(sections) => sections.into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        out
    }))
}
