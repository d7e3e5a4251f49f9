//! Ways, segments and the collections the pipeline operates on.
//!
//! These types serialize with stable snake_case names (`join_type`, `ways`,
//! `segments`, `radius`, `curvature`, `curvature_level`, `min_lat`, ...) which
//! renderers read. Optional fields are left out until a stage fills them in.

use serde::Serialize;

use crate::{
    errors::Result,
    geometry::BoundingBox,
    pipeline::Field,
};

use super::osm::{tag_matches, Coordinate, OsmId, Tags};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Ref,
    Name,
    None,
}

/// Directed edge between two consecutive coordinates of a way.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Coordinate,
    pub end: Coordinate,
    pub length: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curvature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curvature_level: Option<u8>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub eliminated: bool,
}

impl Segment {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        let length = start.distance_to(&end);
        Segment::with_length(start, end, length)
    }

    pub fn with_length(start: Coordinate, end: Coordinate, length: f64) -> Self {
        Segment {
            start,
            end,
            length,
            radius: None,
            curvature: None,
            curvature_level: None,
            eliminated: false,
        }
    }

    pub fn curvature(&self, stage: &str) -> Result<f64> {
        self.curvature
            .ok_or_else(|| crate::errors::Error::missing_field(stage, Field::SegmentCurvature))
    }

    pub fn level(&self, stage: &str) -> Result<u8> {
        self.curvature_level
            .ok_or_else(|| crate::errors::Error::missing_field(stage, Field::SegmentCurvature))
    }

    /// Zero the curvature contribution of this segment.
    pub fn squash(&mut self) {
        self.curvature = Some(0.0);
        self.curvature_level = Some(0);
    }

    /// Add `amount` to the curvature and raise the level by one, up to 4.
    pub fn inflate(&mut self, amount: f64) {
        self.curvature = Some(self.curvature.unwrap_or(0.0) + amount);
        if let Some(level) = self.curvature_level.as_mut() {
            *level = (*level + 1).min(4);
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    pub tags: Tags,
    pub refs: Vec<OsmId>,
    pub coords: Vec<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curvature: Option<f64>,
}

impl Way {
    pub fn new(id: OsmId, tags: Tags, refs: Vec<OsmId>, coords: Vec<Coordinate>) -> Self {
        Way {
            id,
            tags,
            refs,
            coords,
            segments: None,
            length: None,
            curvature: None,
        }
    }

    pub fn first_ref(&self) -> OsmId {
        self.refs[0]
    }

    pub fn last_ref(&self) -> OsmId {
        self.refs[self.refs.len() - 1]
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str, values: Option<&[String]>) -> bool {
        tag_matches(&self.tags, key, values)
    }

    /// A copy of this way traversed in the opposite direction. The original is
    /// left untouched since other route groups may still join it as-is.
    pub fn reversed(&self) -> Way {
        let mut copy = self.clone();
        copy.refs.reverse();
        copy.coords.reverse();
        if let Some(segments) = copy.segments.as_mut() {
            segments.reverse();
            for segment in segments.iter_mut() {
                std::mem::swap(&mut segment.start, &mut segment.end);
            }
        }
        copy
    }

    /// An empty way with the same id and tags, used to build sections of it.
    pub fn section(&self) -> Way {
        Way {
            id: self.id,
            tags: self.tags.clone(),
            refs: Vec::new(),
            coords: Vec::new(),
            segments: self.segments.as_ref().map(|_| Vec::new()),
            length: None,
            curvature: None,
        }
    }

    pub fn segments(&self, stage: &str) -> Result<&[Segment]> {
        self.segments
            .as_deref()
            .ok_or_else(|| crate::errors::Error::missing_field(stage, Field::Segments))
    }

    pub fn segments_mut(&mut self, stage: &str) -> Result<&mut Vec<Segment>> {
        self.segments
            .as_mut()
            .ok_or_else(|| crate::errors::Error::missing_field(stage, Field::Segments))
    }
}

/// One or more ways joined end to end under a shared route identity.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Collection {
    pub join_type: JoinType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_data: Option<String>,
    pub ways: Vec<Way>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curvature: Option<f64>,
    #[serde(flatten)]
    pub bounds: Option<BoundingBox>,
}

impl Collection {
    pub fn new(join_type: JoinType, join_data: Option<String>, ways: Vec<Way>) -> Self {
        Collection {
            join_type,
            join_data,
            ways,
            length: None,
            curvature: None,
            bounds: None,
        }
    }

    /// An empty collection carrying the same route identity, for splitters.
    /// Rolled-up values are not carried over since they describe the whole.
    pub fn section(&self) -> Collection {
        Collection::new(self.join_type, self.join_data.clone(), Vec::new())
    }

    /// All segments of the collection in order, across way boundaries.
    pub fn segments(&self, stage: &str) -> Result<Vec<&Segment>> {
        let mut all = Vec::new();
        for way in &self.ways {
            all.extend(way.segments(stage)?.iter());
        }
        Ok(all)
    }

    pub fn segments_mut(&mut self, stage: &str) -> Result<Vec<&mut Segment>> {
        let mut all = Vec::new();
        for way in self.ways.iter_mut() {
            all.extend(way.segments_mut(stage)?.iter_mut());
        }
        Ok(all)
    }

    /// Sum of segment lengths, preferring already rolled-up values.
    pub fn total_length(&self, stage: &str) -> Result<f64> {
        if let Some(length) = self.length {
            return Ok(length);
        }
        let mut total = 0.0;
        for way in &self.ways {
            total += match way.length {
                Some(length) => length,
                None => way.segments(stage)?.iter().map(|s| s.length).sum::<f64>(),
            };
        }
        Ok(total)
    }

    /// Recompute curvature roll-ups that are present after segments changed.
    pub fn refresh_curvature(&mut self, stage: &str) -> Result<()> {
        for way in self.ways.iter_mut() {
            if way.curvature.is_some() {
                let mut sum = 0.0;
                for segment in way.segments(stage)? {
                    sum += segment.curvature(stage)?;
                }
                way.curvature = Some(sum);
            }
        }
        if self.curvature.is_some() {
            self.curvature = None;
            self.curvature = Some(self.total_curvature(stage)?);
        }
        Ok(())
    }

    /// Sum of segment curvature, preferring already rolled-up values.
    pub fn total_curvature(&self, stage: &str) -> Result<f64> {
        if let Some(curvature) = self.curvature {
            return Ok(curvature);
        }
        let mut total = 0.0;
        for way in &self.ways {
            total += match way.curvature {
                Some(curvature) => curvature,
                None => {
                    let mut sum = 0.0;
                    for segment in way.segments(stage)? {
                        sum += segment.curvature(stage)?;
                    }
                    sum
                }
            };
        }
        Ok(total)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn reversing_copies_and_leaves_original_intact() {
        let original = way_with_segments(1, 10, &[(100.0, 1), (50.0, 0)]);
        let reversed = original.reversed();
        assert_eq!(original.refs, vec![10, 11, 12]);
        assert_eq!(reversed.refs, vec![12, 11, 10]);
        assert_eq!(reversed.coords[0], original.coords[2]);
        let segments = reversed.segments.as_ref().unwrap();
        assert_eq!(segments[0].length, 50.0);
        assert_eq!(segments[0].start, original.coords[2]);
        assert_eq!(segments[1].end, original.coords[0]);
    }

    #[test]
    fn missing_segments_name_the_producer() {
        let collection = Collection::new(JoinType::None, None, vec![way(1, &[1, 2], &[(0.0, 0.0), (0.0, 1.0)])]);
        let err = collection.segments("some_stage").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingField);
        assert!(err.message.contains("add_segments"));
        assert!(err.message.contains("some_stage"));
    }

    #[test]
    fn totals_prefer_rolled_up_values() {
        let mut first = way_with_segments(1, 10, &[(100.0, 1), (50.0, 0)]);
        let second = way_with_segments(2, 12, &[(10.0, 2)]);
        first.curvature = Some(7.0);
        let mut collection = Collection::new(JoinType::Name, Some("A".into()), vec![first, second]);
        assert_eq!(collection.total_length("test").unwrap(), 160.0);
        assert_eq!(collection.total_curvature("test").unwrap(), 17.0);
        collection.length = Some(1.0);
        assert_eq!(collection.total_length("test").unwrap(), 1.0);
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let mut collection = Collection::new(
            JoinType::Ref,
            Some("VT 100".into()),
            vec![way_with_segments(1, 10, &[(100.0, 1)])],
        );
        collection.bounds = Some(BoundingBox::around(44.0, -73.0));
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["join_type"], "ref");
        assert_eq!(json["join_data"], "VT 100");
        assert_eq!(json["min_lat"], 44.0);
        assert_eq!(json["ways"][0]["segments"][0]["curvature_level"], 1);
        assert!(json.get("length").is_none());
        assert!(json["ways"][0]["segments"][0].get("eliminated").is_none());
    }
}
