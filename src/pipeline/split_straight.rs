use crate::{
    data::{Collection, Way},
    errors::{Error, Result},
};

use super::{
    split_each,
    traversal::{append_segment, merge_sections},
    CollectionStream, Field, Stage, ROLLED_UP_FIELDS,
};

/// 2414 meters is about 1.5 miles.
pub const DEFAULT_THRESHOLD_M: f64 = 2414.0;

/// Cuts collections apart at straight runs longer than a threshold so that a
/// long straight road does not absorb the curvy sections on either side of it.
pub struct SplitCollectionsOnStraightSegments {
    threshold: f64,
    emit_straight_sections: bool,
}

struct SectionBuffers<'c> {
    source: &'c Collection,
    output: Vec<Collection>,
    current: Vec<Way>,
    straight: Vec<Way>,
    straight_distance: f64,
}

impl SectionBuffers<'_> {
    fn push_section(&mut self, ways: Vec<Way>) {
        let mut section = self.source.section();
        section.ways = ways;
        self.output.push(section);
    }

    /// Emit the pending curvy section followed by the long straight run.
    fn flush(&mut self, emit_straight: bool) {
        if !self.current.is_empty() {
            let current = std::mem::take(&mut self.current);
            self.push_section(current);
        }
        let straight = std::mem::take(&mut self.straight);
        if emit_straight && !straight.is_empty() {
            self.push_section(straight);
        }
        self.straight_distance = 0.0;
    }

    /// A straight run too short to split on stays part of the current section.
    fn absorb_straight(&mut self) {
        let straight = std::mem::take(&mut self.straight);
        merge_sections(straight, &mut self.current);
    }
}

impl SplitCollectionsOnStraightSegments {
    pub const STAGE_NAME: &'static str = "split_collections_on_straight_segments";

    pub fn new(threshold: f64, emit_straight_sections: bool) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(Error::config(format!(
                "{} length must be greater than 0, got {}",
                Self::STAGE_NAME, threshold
            )));
        }
        Ok(SplitCollectionsOnStraightSegments {
            threshold,
            emit_straight_sections,
        })
    }

    pub fn split(&self, collection: Collection) -> Result<Vec<Collection>> {
        let mut buffers = SectionBuffers {
            source: &collection,
            output: Vec::new(),
            current: Vec::new(),
            straight: Vec::new(),
            straight_distance: 0.0,
        };

        for way in &collection.ways {
            let segments = way.segments(Self::STAGE_NAME)?;
            for (index, segment) in segments.iter().enumerate() {
                let curved = segment.level(Self::STAGE_NAME)? > 0;
                if curved {
                    if buffers.straight_distance > self.threshold {
                        buffers.flush(self.emit_straight_sections);
                    } else {
                        buffers.absorb_straight();
                    }
                    buffers.straight_distance = 0.0;
                    append_segment(way, index, &mut buffers.current);
                } else {
                    buffers.straight_distance += segment.length;
                    append_segment(way, index, &mut buffers.straight);
                }
            }
        }

        if !buffers.straight.is_empty() && buffers.straight_distance > self.threshold {
            buffers.flush(self.emit_straight_sections);
        } else {
            buffers.absorb_straight();
            if !buffers.current.is_empty() {
                let current = std::mem::take(&mut buffers.current);
                buffers.push_section(current);
            }
        }
        Ok(buffers.output)
    }
}

impl Stage for SplitCollectionsOnStraightSegments {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn invalidates(&self) -> &'static [Field] {
        ROLLED_UP_FIELDS
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        split_each(input, move |collection| self.split(collection))
    }
}
