//! Helpers for walking a collection segment by segment and for assembling
//! the pieces that splitters emit.

use crate::data::{Collection, Segment, Way};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Position of a segment within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentPosition {
    pub way_index: usize,
    pub segment_index: usize,
}

/// Cursor over the segments of a collection that crosses way boundaries in
/// either direction. Ways without segments are stepped over.
pub struct CollectionSegmentTraverser<'c> {
    collection: &'c Collection,
    start: SegmentPosition,
    position: Option<SegmentPosition>,
    direction: Direction,
}

impl<'c> CollectionSegmentTraverser<'c> {
    pub fn new(collection: &'c Collection) -> Self {
        let start = SegmentPosition { way_index: 0, segment_index: 0 };
        Self::starting_at(collection, start, Direction::Forward)
    }

    pub fn starting_at(collection: &'c Collection, start: SegmentPosition, direction: Direction) -> Self {
        let position = Self::segment_at(collection, start).map(|_| start);
        CollectionSegmentTraverser {
            collection,
            start,
            position,
            direction,
        }
    }

    fn segment_at(collection: &'c Collection, position: SegmentPosition) -> Option<&'c Segment> {
        collection
            .ways
            .get(position.way_index)?
            .segments
            .as_ref()?
            .get(position.segment_index)
    }

    fn segment_count(&self, way_index: usize) -> usize {
        self.collection.ways[way_index]
            .segments
            .as_ref()
            .map_or(0, |segments| segments.len())
    }

    pub fn position(&self) -> Option<SegmentPosition> {
        self.position
    }

    pub fn current(&self) -> Option<&'c Segment> {
        self.position.and_then(|position| Self::segment_at(self.collection, position))
    }

    pub fn has_next(&self) -> bool {
        self.position.is_some()
    }

    pub fn advance(&mut self) {
        let Some(position) = self.position else {
            return;
        };
        self.position = match self.direction {
            Direction::Forward => self.following(position),
            Direction::Backward => self.preceding(position),
        };
    }

    fn following(&self, position: SegmentPosition) -> Option<SegmentPosition> {
        if position.segment_index + 1 < self.segment_count(position.way_index) {
            return Some(SegmentPosition {
                segment_index: position.segment_index + 1,
                ..position
            });
        }
        (position.way_index + 1..self.collection.ways.len())
            .find(|&way_index| self.segment_count(way_index) > 0)
            .map(|way_index| SegmentPosition { way_index, segment_index: 0 })
    }

    fn preceding(&self, position: SegmentPosition) -> Option<SegmentPosition> {
        if position.segment_index > 0 {
            return Some(SegmentPosition {
                segment_index: position.segment_index - 1,
                ..position
            });
        }
        (0..position.way_index)
            .rev()
            .find(|&way_index| self.segment_count(way_index) > 0)
            .map(|way_index| SegmentPosition {
                way_index,
                segment_index: self.segment_count(way_index) - 1,
            })
    }

    /// Return to the position the traverser was created at.
    pub fn reset(&mut self) {
        self.position = Self::segment_at(self.collection, self.start).map(|_| self.start);
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }
}

impl<'c> Iterator for CollectionSegmentTraverser<'c> {
    type Item = (SegmentPosition, &'c Segment);

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.position?;
        let segment = self.current()?;
        self.advance();
        Some((position, segment))
    }
}

/// Copy segment `index` of `way`, with its bounding refs and coordinates, onto
/// the end of `sections`. Consecutive segments of the same way share a section.
pub fn append_segment(way: &Way, index: usize, sections: &mut Vec<Way>) {
    let needs_new_section = sections.last().map_or(true, |last| last.id != way.id);
    if needs_new_section {
        let mut section = way.section();
        section.segments = Some(Vec::new());
        sections.push(section);
    }
    let Some(section) = sections.last_mut() else {
        return;
    };
    if section.refs.is_empty() {
        section.refs.push(way.refs[index]);
        section.coords.push(way.coords[index].clone());
    }
    section.refs.push(way.refs[index + 1]);
    section.coords.push(way.coords[index + 1].clone());
    if let Some(segment) = way.segments.as_ref().and_then(|segments| segments.get(index)) {
        section.segments.get_or_insert_with(Vec::new).push(segment.clone());
    }
}

/// Move `source` sections onto the end of `destination`, merging the seam when
/// both sides are pieces of the same way.
pub fn merge_sections(source: Vec<Way>, destination: &mut Vec<Way>) {
    let mut source = source.into_iter();
    let Some(first) = source.next() else {
        return;
    };
    match destination.last_mut() {
        Some(last) if last.id == first.id => {
            last.refs.extend(first.refs.into_iter().skip(1));
            last.coords.extend(first.coords.into_iter().skip(1));
            if let Some(segments) = first.segments {
                last.segments.get_or_insert_with(Vec::new).extend(segments);
            }
        }
        _ => destination.push(first),
    }
    destination.extend(source);
}
