use crate::{data::Collection, errors::Result};

use super::{map_each, CollectionStream, Field, Stage};

/// Sums segment lengths into each way and/or collection.
pub struct RollUpLength {
    add_to_ways: bool,
    add_to_collections: bool,
}

impl RollUpLength {
    pub const STAGE_NAME: &'static str = "roll_up_length";

    pub fn new(add_to_ways: bool, add_to_collections: bool) -> Self {
        RollUpLength {
            add_to_ways,
            add_to_collections,
        }
    }

    fn roll_up(&self, mut collection: Collection) -> Result<Collection> {
        let mut collection_sum = 0.0;
        for way in collection.ways.iter_mut() {
            let way_sum: f64 = way.segments(Self::STAGE_NAME)?.iter().map(|s| s.length).sum();
            collection_sum += way_sum;
            if self.add_to_ways {
                way.length = Some(way_sum);
            }
        }
        if self.add_to_collections {
            collection.length = Some(collection_sum);
        }
        Ok(collection)
    }
}

impl Stage for RollUpLength {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::Segments]
    }

    fn produces(&self) -> &'static [Field] {
        match (self.add_to_ways, self.add_to_collections) {
            (true, true) => &[Field::WayLength, Field::CollectionLength],
            (true, false) => &[Field::WayLength],
            (false, true) => &[Field::CollectionLength],
            (false, false) => &[],
        }
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.roll_up(collection))
    }
}

/// Sums segment curvature into each way and/or collection.
pub struct RollUpCurvature {
    add_to_ways: bool,
    add_to_collections: bool,
}

impl RollUpCurvature {
    pub const STAGE_NAME: &'static str = "roll_up_curvature";

    pub fn new(add_to_ways: bool, add_to_collections: bool) -> Self {
        RollUpCurvature {
            add_to_ways,
            add_to_collections,
        }
    }

    fn roll_up(&self, mut collection: Collection) -> Result<Collection> {
        let mut collection_sum = 0.0;
        for way in collection.ways.iter_mut() {
            let mut way_sum = 0.0;
            for segment in way.segments(Self::STAGE_NAME)? {
                way_sum += segment.curvature(Self::STAGE_NAME)?;
            }
            collection_sum += way_sum;
            if self.add_to_ways {
                way.curvature = Some(way_sum);
            }
        }
        if self.add_to_collections {
            collection.curvature = Some(collection_sum);
        }
        Ok(collection)
    }
}

impl Stage for RollUpCurvature {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn produces(&self) -> &'static [Field] {
        match (self.add_to_ways, self.add_to_collections) {
            (true, true) => &[Field::WayCurvature, Field::CollectionCurvature],
            (true, false) => &[Field::WayCurvature],
            (false, true) => &[Field::CollectionCurvature],
            (false, false) => &[],
        }
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.roll_up(collection))
    }
}
