use crate::{
    curvature::CurvatureLevels,
    data::Collection,
    errors::{Error, Result},
};

use super::{map_each, CollectionStream, Field, Stage};

/// Classifies every segment by its radius and records its weighted curvature.
pub struct AddSegmentCurvature {
    levels: CurvatureLevels,
}

impl AddSegmentCurvature {
    pub const STAGE_NAME: &'static str = "add_segment_curvature";

    pub fn new(levels: CurvatureLevels) -> Self {
        AddSegmentCurvature { levels }
    }

    fn add_curvature(&self, mut collection: Collection) -> Result<Collection> {
        for segment in collection.segments_mut(Self::STAGE_NAME)? {
            let radius = segment
                .radius
                .ok_or_else(|| Error::missing_field(Self::STAGE_NAME, Field::SegmentRadius))?;
            let (level, curvature) = self.levels.curvature_for_segment(segment.length, radius);
            segment.curvature_level = Some(level);
            segment.curvature = Some(curvature);
        }
        Ok(collection)
    }
}

impl Stage for AddSegmentCurvature {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentRadius]
    }

    fn produces(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.add_curvature(collection))
    }
}
