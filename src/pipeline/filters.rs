//! Filters that keep or drop whole collections by their totals.

use crate::{data::Collection, errors::Result};

use super::{filter_each, CollectionStream, Field, Stage};

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

pub struct FilterCollectionsByCurvature {
    min: Option<f64>,
    max: Option<f64>,
}

impl FilterCollectionsByCurvature {
    pub const STAGE_NAME: &'static str = "filter_collections_by_curvature";

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        FilterCollectionsByCurvature { min, max }
    }

    fn keep(&self, collection: &Collection) -> Result<bool> {
        let curvature = collection.total_curvature(Self::STAGE_NAME)?;
        Ok(within(curvature, self.min, self.max))
    }
}

impl Stage for FilterCollectionsByCurvature {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        filter_each(input, move |collection| self.keep(collection))
    }
}

pub struct FilterCollectionsByLength {
    min: Option<f64>,
    max: Option<f64>,
}

impl FilterCollectionsByLength {
    pub const STAGE_NAME: &'static str = "filter_collections_by_length";

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        FilterCollectionsByLength { min, max }
    }

    fn keep(&self, collection: &Collection) -> Result<bool> {
        let length = collection.total_length(Self::STAGE_NAME)?;
        Ok(within(length, self.min, self.max))
    }
}

impl Stage for FilterCollectionsByLength {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::Segments]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        filter_each(input, move |collection| self.keep(collection))
    }
}

/// Keeps collections made of a number of ways within the bounds.
pub struct FilterCollectionsByNumWays {
    min: Option<usize>,
    max: Option<usize>,
}

impl FilterCollectionsByNumWays {
    pub const STAGE_NAME: &'static str = "filter_collections_by_num_ways";

    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        FilterCollectionsByNumWays { min, max }
    }

    fn keep(&self, collection: &Collection) -> bool {
        let count = collection.ways.len();
        self.min.map_or(true, |min| count >= min) && self.max.map_or(true, |max| count <= max)
    }
}

impl Stage for FilterCollectionsByNumWays {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        filter_each(input, move |collection| Ok(self.keep(collection)))
    }
}
