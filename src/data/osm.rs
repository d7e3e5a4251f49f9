use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

pub type OsmId = i64;

pub type Tags = HashMap<String, String>;

/// Whether `tags` has `key`, and when `values` is given, one of those values.
pub fn tag_matches(tags: &Tags, key: &str, values: Option<&[String]>) -> bool {
    match (tags.get(key), values) {
        (Some(_), None) => true,
        (Some(value), Some(values)) => values.iter().any(|v| v == value),
        (None, _) => false,
    }
}

/// A node as read from the map file, before we know whether anything references it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

/// A way as read from the map file: tags plus the ordered node ids it passes through.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWay {
    pub id: OsmId,
    pub tags: Tags,
    pub refs: Vec<OsmId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OsmElement {
    Node(RawNode),
    Way(RawWay),
}

/// A node that carries tags we care about (stop signs, signals, crossings).
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

impl Node {
    pub fn has_tag(&self, key: &str, values: Option<&[String]>) -> bool {
        tag_matches(&self.tags, key, values)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Arc<Node>>,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinate { lat, lon, node: None }
    }

    pub fn with_node(node: Arc<Node>) -> Self {
        Coordinate {
            lat: node.lat,
            lon: node.lon,
            node: Some(node),
        }
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        crate::geometry::distance_on_earth(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        crate::geometry::bearing(self.lat, self.lon, other.lat, other.lon)
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}
