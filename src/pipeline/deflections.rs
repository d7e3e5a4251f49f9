use crate::{
    data::{Collection, Segment},
    errors::Result,
    geometry::heading_difference,
};

use super::{map_each, CollectionStream, Field, Stage};

/// Longest run of curved segments between two straights that may be treated as noise.
const MAX_EXCURSION_SEGMENTS: usize = 4;

/// Suppresses short jogs off an otherwise straight line.
///
/// A run of one to four curved segments bounded by straight segments is
/// reclassified as straight when the heading before and after it differs by
/// less than a curve at the level 1 radius would turn over the same gap.
pub struct FilterSegmentDeflections {
    level_1_max_radius: f64,
    keep_eliminated: bool,
}

impl FilterSegmentDeflections {
    pub const STAGE_NAME: &'static str = "filter_segment_deflections";

    pub fn new(level_1_max_radius: f64, keep_eliminated: bool) -> Self {
        FilterSegmentDeflections {
            level_1_max_radius,
            keep_eliminated,
        }
    }

    fn is_straight(segment: &Segment) -> Result<bool> {
        Ok(segment.level(Self::STAGE_NAME)? == 0 || segment.eliminated)
    }

    pub fn filter_deflections(&self, segments: &mut [&mut Segment]) -> Result<()> {
        for first in 0..segments.len() {
            for width in 1..=MAX_EXCURSION_SEGMENTS {
                let next = first + width + 1;
                if next >= segments.len() {
                    break;
                }
                self.filter_excursion(segments, first, next)?;
            }
        }
        Ok(())
    }

    fn filter_excursion(&self, segments: &mut [&mut Segment], first: usize, next: usize) -> Result<()> {
        let before = &*segments[first];
        let after = &*segments[next];
        if !Self::is_straight(before)? || !Self::is_straight(after)? {
            return Ok(());
        }
        let heading_change = heading_difference(
            before.start.bearing_to(&before.end),
            after.start.bearing_to(&after.end),
        );
        let gap = before.end.distance_to(&after.start);
        // Turn of a borderline level 1 curve over the gap, in radians.
        let min_variance = gap / self.level_1_max_radius;
        if heading_change >= min_variance {
            return Ok(());
        }

        for segment in segments[first + 1..next].iter_mut() {
            if segment.level(Self::STAGE_NAME)? > 0 {
                segment.eliminated = true;
                if !self.keep_eliminated {
                    segment.squash();
                }
            }
        }
        Ok(())
    }

    fn filter_collection(&self, mut collection: Collection) -> Result<Collection> {
        let mut segments = collection.segments_mut(Self::STAGE_NAME)?;
        self.filter_deflections(&mut segments)?;
        collection.refresh_curvature(Self::STAGE_NAME)?;
        Ok(collection)
    }
}

impl Stage for FilterSegmentDeflections {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.filter_collection(collection))
    }
}
