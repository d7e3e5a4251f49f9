//! Stages that squash or inflate segment curvature around tagged features.
//!
//! Squashing zeroes the curvature and level of a segment, e.g. on roundabouts
//! or next to stop signs where nobody drives the curve at speed. Inflating adds
//! a fixed amount of curvature and raises the level by one. The nearby stages
//! walk `distance` meters in both directions from a trigger point, across way
//! boundaries. Rolled-up curvature is refreshed afterwards.

use crate::{
    data::{Collection, Coordinate, Segment, Way},
    errors::Result,
};

use super::{
    map_each,
    traversal::{CollectionSegmentTraverser, Direction, SegmentPosition},
    CollectionStream, Field, Stage,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Adjustment {
    Squash,
    Inflate(f64),
}

impl Adjustment {
    fn apply(self, segment: &mut Segment) {
        match self {
            Adjustment::Squash => segment.squash(),
            Adjustment::Inflate(amount) => segment.inflate(amount),
        }
    }

    /// Adjust every listed segment once, however many trigger points reached it.
    fn apply_at(self, mut collection: Collection, mut positions: Vec<SegmentPosition>, stage: &str) -> Result<Collection> {
        positions.sort();
        positions.dedup();
        for position in positions {
            let segments = collection.ways[position.way_index].segments_mut(stage)?;
            if let Some(segment) = segments.get_mut(position.segment_index) {
                self.apply(segment);
            }
        }
        collection.refresh_curvature(stage)?;
        Ok(collection)
    }

    fn apply_to_tagged_ways(
        self,
        mut collection: Collection,
        tag: &str,
        values: Option<&[String]>,
        stage: &str,
    ) -> Result<Collection> {
        for way in collection.ways.iter_mut() {
            if !way.has_tag(tag, values) {
                continue;
            }
            for segment in way.segments_mut(stage)?.iter_mut() {
                self.apply(segment);
            }
        }
        collection.refresh_curvature(stage)?;
        Ok(collection)
    }
}

/// Segments reached walking `distance` meters from where `traverser` starts. A
/// segment is included when the distance covered before entering it is still
/// short, so one that starts inside the distance counts in full.
fn walk(mut traverser: CollectionSegmentTraverser<'_>, skip_first: bool, distance: f64, out: &mut Vec<SegmentPosition>) {
    if skip_first {
        traverser.advance();
    }
    let mut covered = 0.0;
    for (position, segment) in traverser {
        if covered >= distance {
            break;
        }
        out.push(position);
        covered += segment.length;
    }
}

/// Walk both ways from the start of the segment at `here`.
fn walk_from_start(collection: &Collection, here: SegmentPosition, distance: f64, out: &mut Vec<SegmentPosition>) {
    walk(CollectionSegmentTraverser::starting_at(collection, here, Direction::Forward), false, distance, out);
    walk(CollectionSegmentTraverser::starting_at(collection, here, Direction::Backward), true, distance, out);
}

/// Walk both ways from the end of the segment at `here`.
fn walk_from_end(collection: &Collection, here: SegmentPosition, distance: f64, out: &mut Vec<SegmentPosition>) {
    walk(CollectionSegmentTraverser::starting_at(collection, here, Direction::Backward), false, distance, out);
    walk(CollectionSegmentTraverser::starting_at(collection, here, Direction::Forward), true, distance, out);
}

/// Nodes carrying `tag`, or one of `values` of it when given.
#[derive(Debug, Clone)]
struct TaggedNodes {
    tag: String,
    values: Option<Vec<String>>,
    distance: f64,
}

impl TaggedNodes {
    fn matches(&self, coord: &Coordinate) -> bool {
        coord
            .node
            .as_ref()
            .map_or(false, |node| node.has_tag(&self.tag, self.values.as_deref()))
    }

    fn nearby_segments(&self, collection: &Collection, stage: &str) -> Result<Vec<SegmentPosition>> {
        let mut positions = Vec::new();
        for (way_index, way) in collection.ways.iter().enumerate() {
            for (segment_index, segment) in way.segments(stage)?.iter().enumerate() {
                let here = SegmentPosition { way_index, segment_index };
                if self.matches(&segment.start) {
                    walk_from_start(collection, here, self.distance, &mut positions);
                }
                if self.matches(&segment.end) {
                    walk_from_end(collection, here, self.distance, &mut positions);
                }
            }
        }
        Ok(positions)
    }
}

/// Points along a collection where the value of a way tag changes.
#[derive(Debug, Clone)]
struct WayTagChanges {
    tag: String,
    only_values: Option<Vec<String>>,
    ignored_values: Vec<String>,
    distance: f64,
}

impl WayTagChanges {
    /// The tag value that counts for `way`. Values outside `only_values`, or
    /// listed in `ignored_values`, count as unset.
    fn value<'w>(&self, way: &'w Way) -> Option<&'w str> {
        let value = way.tag(&self.tag)?;
        match &self.only_values {
            Some(only) => only.iter().any(|v| v == value).then_some(value),
            None => (!self.ignored_values.iter().any(|v| v == value)).then_some(value),
        }
    }

    fn nearby_segments(&self, collection: &Collection, stage: &str) -> Result<Vec<SegmentPosition>> {
        collection.segments(stage)?;
        let mut positions = Vec::new();
        let Some(first) = collection.ways.first() else {
            return Ok(positions);
        };
        let mut current = self.value(first);
        for (way_index, way) in collection.ways.iter().enumerate().skip(1) {
            let value = self.value(way);
            if value != current {
                let here = SegmentPosition { way_index, segment_index: 0 };
                walk_from_start(collection, here, self.distance, &mut positions);
                current = value;
            }
        }
        Ok(positions)
    }
}

/// Zeroes the curvature of ways with a tag, e.g. `junction=roundabout`.
pub struct SquashCurvatureForTaggedWays {
    tag: String,
    values: Option<Vec<String>>,
}

impl SquashCurvatureForTaggedWays {
    pub const STAGE_NAME: &'static str = "squash_curvature_for_tagged_ways";

    pub fn new(tag: String, values: Option<Vec<String>>) -> Self {
        SquashCurvatureForTaggedWays { tag, values }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        Adjustment::Squash.apply_to_tagged_ways(collection, &self.tag, self.values.as_deref(), Self::STAGE_NAME)
    }
}

impl Stage for SquashCurvatureForTaggedWays {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}

/// Adds curvature to every segment of ways with a tag.
pub struct InflateCurvatureForTaggedWays {
    tag: String,
    values: Option<Vec<String>>,
    curvature: f64,
}

impl InflateCurvatureForTaggedWays {
    pub const STAGE_NAME: &'static str = "inflate_curvature_for_tagged_ways";

    pub fn new(tag: String, values: Option<Vec<String>>, curvature: f64) -> Self {
        InflateCurvatureForTaggedWays { tag, values, curvature }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        Adjustment::Inflate(self.curvature).apply_to_tagged_ways(
            collection,
            &self.tag,
            self.values.as_deref(),
            Self::STAGE_NAME,
        )
    }
}

impl Stage for InflateCurvatureForTaggedWays {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}

/// Zeroes the curvature of segments within a distance of tagged nodes such as
/// stop signs.
pub struct SquashCurvatureNearTaggedNodes {
    nodes: TaggedNodes,
}

impl SquashCurvatureNearTaggedNodes {
    pub const STAGE_NAME: &'static str = "squash_curvature_near_tagged_nodes";

    pub fn new(tag: String, values: Option<Vec<String>>, distance: f64) -> Self {
        SquashCurvatureNearTaggedNodes {
            nodes: TaggedNodes { tag, values, distance },
        }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        let positions = self.nodes.nearby_segments(&collection, Self::STAGE_NAME)?;
        Adjustment::Squash.apply_at(collection, positions, Self::STAGE_NAME)
    }
}

impl Stage for SquashCurvatureNearTaggedNodes {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}

/// Adds curvature to segments within a distance of tagged nodes, e.g. traffic
/// calming.
pub struct InflateCurvatureNearTaggedNodes {
    nodes: TaggedNodes,
    curvature: f64,
}

impl InflateCurvatureNearTaggedNodes {
    pub const STAGE_NAME: &'static str = "inflate_curvature_near_tagged_nodes";

    pub fn new(tag: String, values: Option<Vec<String>>, distance: f64, curvature: f64) -> Self {
        InflateCurvatureNearTaggedNodes {
            nodes: TaggedNodes { tag, values, distance },
            curvature,
        }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        let positions = self.nodes.nearby_segments(&collection, Self::STAGE_NAME)?;
        Adjustment::Inflate(self.curvature).apply_at(collection, positions, Self::STAGE_NAME)
    }
}

impl Stage for InflateCurvatureNearTaggedNodes {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}

/// Zeroes the curvature of segments near where a way tag changes value along
/// a collection, e.g. where a road turns `oneway`.
pub struct SquashCurvatureNearWayTagChange {
    changes: WayTagChanges,
}

impl SquashCurvatureNearWayTagChange {
    pub const STAGE_NAME: &'static str = "squash_curvature_near_way_tag_change";

    pub fn new(tag: String, only_values: Option<Vec<String>>, ignored_values: Vec<String>, distance: f64) -> Self {
        SquashCurvatureNearWayTagChange {
            changes: WayTagChanges {
                tag,
                only_values,
                ignored_values,
                distance,
            },
        }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        let positions = self.changes.nearby_segments(&collection, Self::STAGE_NAME)?;
        Adjustment::Squash.apply_at(collection, positions, Self::STAGE_NAME)
    }
}

impl Stage for SquashCurvatureNearWayTagChange {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}

/// Adds curvature to segments near where a way tag changes value.
pub struct InflateCurvatureNearWayTagChange {
    changes: WayTagChanges,
    curvature: f64,
}

impl InflateCurvatureNearWayTagChange {
    pub const STAGE_NAME: &'static str = "inflate_curvature_near_way_tag_change";

    pub fn new(
        tag: String,
        only_values: Option<Vec<String>>,
        ignored_values: Vec<String>,
        distance: f64,
        curvature: f64,
    ) -> Self {
        InflateCurvatureNearWayTagChange {
            changes: WayTagChanges {
                tag,
                only_values,
                ignored_values,
                distance,
            },
            curvature,
        }
    }

    fn adjust(&self, collection: Collection) -> Result<Collection> {
        let positions = self.changes.nearby_segments(&collection, Self::STAGE_NAME)?;
        Adjustment::Inflate(self.curvature).apply_at(collection, positions, Self::STAGE_NAME)
    }
}

impl Stage for InflateCurvatureNearWayTagChange {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::SegmentCurvature]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, move |collection| self.adjust(collection))
    }
}
