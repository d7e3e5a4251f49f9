use crate::{
    data::{Collection, Segment},
    errors::Result,
    geometry::{circum_circle_radius, STRAIGHT_RADIUS_M},
};

use super::{map_each, CollectionStream, Field, Stage};

/// Assigns every segment the radius of the tightest circle it is part of.
///
/// Each pair of consecutive segments forms a triangle. Segments are collected
/// across the whole collection, so triangles span way boundaries. An interior
/// segment belongs to two triangles and keeps the smaller radius; the first
/// and last segments belong to one.
pub struct AddSegmentRadius;

impl AddSegmentRadius {
    pub const STAGE_NAME: &'static str = "add_segment_radius";

    pub fn assign_radii(segments: &mut [&mut Segment]) {
        if segments.is_empty() {
            return;
        }
        if segments.len() == 1 {
            segments[0].radius = Some(STRAIGHT_RADIUS_M);
            return;
        }
        let triangles: Vec<f64> = segments
            .windows(2)
            .map(|pair| {
                let base = pair[0].start.distance_to(&pair[1].end);
                circum_circle_radius(pair[0].length, pair[1].length, base)
            })
            .collect();

        let last = segments.len() - 1;
        for (i, segment) in segments.iter_mut().enumerate() {
            let radius = match i {
                0 => triangles[0],
                i if i == last => triangles[last - 1],
                i => triangles[i - 1].min(triangles[i]),
            };
            segment.radius = Some(radius);
        }
    }

    fn add_radii(mut collection: Collection) -> Result<Collection> {
        let mut segments = collection.segments_mut(Self::STAGE_NAME)?;
        Self::assign_radii(&mut segments);
        Ok(collection)
    }
}

impl Stage for AddSegmentRadius {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::Segments]
    }

    fn produces(&self) -> &'static [Field] {
        &[Field::SegmentRadius]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, Self::add_radii)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{collection::fixtures::way, JoinType},
        pipeline::segments::AddSegments,
    };

    fn radii_of(points: &[(f64, f64)], split_at: usize) -> (Vec<f64>, Vec<f64>) {
        let refs: Vec<i64> = (0..points.len() as i64).collect();
        let ways = vec![
            way(1, &refs[..=split_at], &points[..=split_at]),
            way(2, &refs[split_at..], &points[split_at..]),
        ];
        let collection = Collection::new(JoinType::Name, Some("Curvy Road".into()), ways);
        let (add_segments, add_radius) = (AddSegments, AddSegmentRadius);
        let stream = add_radius.process(add_segments.process(Box::new(vec![Ok(collection)].into_iter())));
        let result: Vec<Collection> = stream.collect::<Result<_>>().unwrap();
        let segments = result[0].segments("test").unwrap();
        let radii = segments.iter().map(|s| s.radius.unwrap()).collect();
        let triangles = segments
            .windows(2)
            .map(|pair| circum_circle_radius(pair[0].length, pair[1].length, pair[0].start.distance_to(&pair[1].end)))
            .collect();
        (radii, triangles)
    }

    #[test]
    fn interior_segments_take_the_tighter_triangle() {
        let points = [
            (44.0, -73.0),
            (44.001, -73.0),
            (44.0015, -72.9995),
            (44.0015, -72.998),
            (44.0020, -72.997),
            (44.0030, -72.997),
        ];
        let (radii, triangles) = radii_of(&points, 2);
        assert_eq!(radii.len(), 5);
        assert_eq!(radii[0], triangles[0]);
        for i in 1..radii.len() - 1 {
            assert_eq!(radii[i], triangles[i - 1].min(triangles[i]));
        }
        assert_eq!(radii[4], triangles[3]);
        assert!(radii.iter().all(|r| r.is_finite() && *r > 0.0));
    }

    #[test]
    fn single_segment_is_straight() {
        let collection = Collection::new(
            JoinType::None,
            None,
            vec![way(1, &[1, 2], &[(44.0, -73.0), (44.001, -73.0)])],
        );
        let (add_segments, add_radius) = (AddSegments, AddSegmentRadius);
        let stream = add_radius.process(add_segments.process(Box::new(vec![Ok(collection)].into_iter())));
        let result: Vec<Collection> = stream.collect::<Result<_>>().unwrap();
        assert_eq!(result[0].ways[0].segments.as_ref().unwrap()[0].radius, Some(STRAIGHT_RADIUS_M));
    }

    #[test]
    fn duplicate_points_fall_back_to_straight() {
        let collection = Collection::new(
            JoinType::None,
            None,
            vec![way(1, &[1, 2, 3], &[(44.0, -73.0), (44.0, -73.0), (44.001, -73.0)])],
        );
        let result = AddSegmentRadius::add_radii(AddSegments::add_segments(collection)).unwrap();
        let segments = result.ways[0].segments.as_ref().unwrap();
        assert_eq!(segments[0].radius, Some(STRAIGHT_RADIUS_M));
        assert_eq!(segments[1].radius, Some(STRAIGHT_RADIUS_M));
    }
}
