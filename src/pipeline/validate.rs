use log::error;

use crate::{
    data::Collection,
    errors::{Error, Result},
};

use super::{map_each, CollectionStream, Stage};

/// Fails the stream on the first collection whose ways do not join end to end.
pub struct Validate;

impl Validate {
    pub const STAGE_NAME: &'static str = "validate";

    /// Every discontinuity between adjacent ways of `collection`.
    pub fn problems(collection: &Collection) -> Vec<String> {
        let mut problems = Vec::new();
        let total = collection.ways.len();
        for (i, pair) in collection.ways.windows(2).enumerate() {
            let (previous, way) = (&pair[0], &pair[1]);
            let position = i + 2;
            if way.refs.first() != previous.refs.last() {
                problems.push(format!(
                    "{} of {}. Way {} first ref {:?} != previous way {} last ref {:?}",
                    position,
                    total,
                    way.id,
                    way.refs.first(),
                    previous.id,
                    previous.refs.last()
                ));
            }
            if way.coords.first() != previous.coords.last() {
                problems.push(format!(
                    "{} of {}. Way {} first coord != previous way {} last coord",
                    position, total, way.id, previous.id
                ));
            }
            if let (Some(segments), Some(previous_segments)) = (&way.segments, &previous.segments) {
                let start = segments.first().map(|s| &s.start);
                let end = previous_segments.last().map(|s| &s.end);
                if start != end {
                    problems.push(format!(
                        "{} of {}. Way {} first segment start != previous way {} last segment end",
                        position, total, way.id, previous.id
                    ));
                }
            }
        }
        problems
    }

    fn validate(collection: Collection) -> Result<Collection> {
        let problems = Self::problems(&collection);
        if problems.is_empty() {
            return Ok(collection);
        }
        for problem in &problems {
            error!(join_data = collection.join_data.as_deref().unwrap_or(""); "{}", problem);
        }
        Err(Error::invalid(format!(
            "Collection {} is not contiguous: {}",
            collection.join_data.as_deref().unwrap_or("(unnamed)"),
            problems.join("; ")
        )))
    }
}

impl Stage for Validate {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, Validate::validate)
    }
}
