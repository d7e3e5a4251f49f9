use crate::data::{Collection, Segment};

use super::{map_each, CollectionStream, Field, Stage};

/// Splits every way into segments between consecutive coordinates and
/// measures their length.
pub struct AddSegments;

impl AddSegments {
    pub const STAGE_NAME: &'static str = "add_segments";

    pub fn add_segments(mut collection: Collection) -> Collection {
        for way in collection.ways.iter_mut() {
            let segments = way
                .coords
                .windows(2)
                .map(|pair| Segment::new(pair[0].clone(), pair[1].clone()))
                .collect();
            way.segments = Some(segments);
        }
        collection
    }
}

impl Stage for AddSegments {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn produces(&self) -> &'static [Field] {
        &[Field::Segments]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, |collection| Ok(Self::add_segments(collection)))
    }
}
