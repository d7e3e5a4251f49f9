use log::debug;
use serde::Deserialize;

use crate::{data::Collection, errors::Result};

use super::{CollectionStream, Field, Stage};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Curvature,
    Length,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Orders collections by their total curvature or length.
///
/// This is the one stage that holds the whole stream in memory: nothing is
/// emitted until the input is exhausted.
pub struct SortCollectionsBySum {
    key: SortKey,
    direction: SortDirection,
}

impl SortCollectionsBySum {
    pub const STAGE_NAME: &'static str = "sort_collections_by_sum";

    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        SortCollectionsBySum { key, direction }
    }

    fn sum(&self, collection: &Collection) -> Result<f64> {
        match self.key {
            SortKey::Curvature => collection.total_curvature(Self::STAGE_NAME),
            SortKey::Length => collection.total_length(Self::STAGE_NAME),
        }
    }

    fn sort(&self, input: CollectionStream<'_>) -> Result<Vec<Collection>> {
        let mut keyed = Vec::new();
        for collection in input {
            let collection = collection?;
            keyed.push((self.sum(&collection)?, collection));
        }
        debug!(collections = keyed.len(); "Sorting collections");
        keyed.sort_by(|(a, _), (b, _)| match self.direction {
            SortDirection::Ascending => a.total_cmp(b),
            SortDirection::Descending => b.total_cmp(a),
        });
        Ok(keyed.into_iter().map(|(_, collection)| collection).collect())
    }
}

impl Stage for SortCollectionsBySum {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        match self.key {
            SortKey::Curvature => &[Field::SegmentCurvature],
            SortKey::Length => &[Field::Segments],
        }
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        let sorted = std::iter::once_with(move || match self.sort(input) {
            Ok(collections) => collections.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        });
        Box::new(sorted.flatten())
    }
}

/// Passes on the first `n` collections.
pub struct Head {
    n: usize,
}

impl Head {
    pub const STAGE_NAME: &'static str = "head";

    pub fn new(n: usize) -> Self {
        Head { n }
    }
}

impl Stage for Head {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        Box::new(input.take(self.n))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        data::{collection::fixtures::way_with_segments, JoinType},
        errors::Error,
    };

    fn collections() -> Vec<Collection> {
        let mut rolled_up = Collection::new(JoinType::Ref, Some("US 12345".into()), vec![way_with_segments(2, 1, &[(50.0, 1)])]);
        rolled_up.curvature = Some(1000.0);
        vec![
            Collection::new(JoinType::None, None, vec![way_with_segments(1, 10, &[(30.0, 1), (300.0, 0)])]),
            rolled_up,
            Collection::new(JoinType::None, None, vec![way_with_segments(6, 20, &[(400.0, 2)])]),
        ]
    }

    fn run(stage: &dyn Stage, input: Vec<Collection>) -> Vec<i64> {
        stage
            .process(Box::new(input.into_iter().map(Ok)))
            .map(|collection| collection.unwrap().ways[0].id)
            .collect()
    }

    #[test]
    fn sorts_by_curvature_descending() {
        let stage = SortCollectionsBySum::new(SortKey::Curvature, SortDirection::Descending);
        assert_eq!(run(&stage, collections()), vec![2, 6, 1]);
    }

    #[test]
    fn sorts_by_length_ascending() {
        let stage = SortCollectionsBySum::new(SortKey::Length, SortDirection::Ascending);
        assert_eq!(run(&stage, collections()), vec![2, 1, 6]);
    }

    #[test]
    fn sort_reports_upstream_errors() {
        let stage = SortCollectionsBySum::new(SortKey::Length, SortDirection::Ascending);
        let input: Vec<Result<Collection>> = vec![Ok(collections().remove(0)), Err(Error::invalid("broken"))];
        let output: Result<Vec<Collection>> = stage.process(Box::new(input.into_iter())).collect();
        assert_eq!(output.unwrap_err().message, "broken");
    }

    #[test]
    fn head_stops_pulling_after_n() {
        let pulled = Cell::new(0);
        let input = collections().into_iter().map(|collection| {
            pulled.set(pulled.get() + 1);
            Ok(collection)
        });
        let stage = Head::new(2);
        let output: Vec<Collection> = stage.process(Box::new(input)).map(|c| c.unwrap()).collect();
        assert_eq!(output.len(), 2);
        assert_eq!(pulled.get(), 2);
        assert_eq!(run(&Head::new(10), collections()), vec![1, 2, 6]);
    }
}
