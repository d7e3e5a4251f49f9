pub mod collection;
pub mod osm;

pub use self::collection::{Collection, JoinType, Segment, Way};
pub use self::osm::{Coordinate, Node, OsmElement, OsmId, RawNode, RawWay, Tags};
