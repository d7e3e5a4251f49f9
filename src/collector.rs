//! Turns raw OSM ways into contiguous collections.
//!
//! Ways are filed into route groups by their `ref` (one group per
//! `;`-separated value) or else their `name`. Each group is then joined end to
//! end into as few linear collections as possible. Ways with neither tag become
//! collections on their own. No accepted way is ever dropped unless its
//! geometry is unusable.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::{
    data::{Collection, Coordinate, JoinType, Node, OsmElement, OsmId, RawNode, RawWay, Way},
    errors::Result,
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Accepted `highway` values. Empty accepts every highway.
    pub highway_types: Vec<String>,
    /// Ways with one of these `surface` values are not collected.
    pub ignored_surfaces: Vec<String>,
    /// Nodes carrying any of these keys are kept on their coordinates.
    pub node_tags: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let highway_types = [
            "secondary",
            "residential",
            "tertiary",
            "primary",
            "primary_link",
            "motorway",
            "motorway_link",
            "road",
            "trunk",
            "trunk_link",
            "unclassified",
        ];
        CollectorConfig {
            highway_types: highway_types.iter().map(|s| s.to_string()).collect(),
            ignored_surfaces: Vec::new(),
            node_tags: vec!["highway".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    join_type: JoinType,
    join_data: String,
}

/// Order in which ways of a route group are tried when joining. Lower is
/// tried first, so joining follows the main line before ramps and roundabouts.
fn join_priority(way: &Way) -> u8 {
    let highway = way.tag("highway").unwrap_or("");
    let junction = way.tag("junction");
    let oneway = matches!(way.tag("oneway"), Some("yes" | "true" | "1" | "-1"));
    if matches!(junction, Some("roundabout" | "circular")) {
        5
    } else if highway.ends_with("_link") {
        1
    } else {
        match (oneway, junction.is_some()) {
            (false, false) => 0,
            (false, true) => 2,
            (true, false) => 3,
            (true, true) => 4,
        }
    }
}

/// A collection being grown from a seed way.
struct Chain {
    ways: VecDeque<Way>,
    refs: HashSet<OsmId>,
}

impl Chain {
    fn new(seed: &Way) -> Self {
        Chain {
            refs: seed.refs.iter().copied().collect(),
            ways: VecDeque::from([seed.clone()]),
        }
    }

    fn first_ref(&self) -> Option<OsmId> {
        self.ways.front().map(Way::first_ref)
    }

    fn last_ref(&self) -> Option<OsmId> {
        self.ways.back().map(Way::last_ref)
    }

    /// Attach `candidate` to whichever end it continues, copying it reversed
    /// when needed. A candidate whose far end is already part of the chain
    /// would fork or close it and is refused.
    fn try_attach(&mut self, candidate: &Way) -> bool {
        let (Some(first), Some(last)) = (self.first_ref(), self.last_ref()) else {
            return false;
        };
        let (start, end) = (candidate.first_ref(), candidate.last_ref());
        if start == last && !self.refs.contains(&end) {
            self.ways.push_back(candidate.clone());
        } else if end == last && !self.refs.contains(&start) {
            self.ways.push_back(candidate.reversed());
        } else if end == first && !self.refs.contains(&start) {
            self.ways.push_front(candidate.clone());
        } else if start == first && !self.refs.contains(&end) {
            self.ways.push_front(candidate.reversed());
        } else {
            return false;
        }
        self.refs.extend(candidate.refs.iter().copied());
        true
    }
}

/// Join the ways of one route group into linear chains.
fn join_group(mut ways: Vec<Arc<Way>>) -> Vec<Vec<Way>> {
    ways.sort_by_key(|way| (join_priority(way), way.id));
    let mut pool: VecDeque<Arc<Way>> = ways.into();
    let mut chains = Vec::new();

    while let Some(seed) = pool.pop_front() {
        let mut chain = Chain::new(&seed);
        let max_passes = pool.len();
        for _ in 0..max_passes {
            let mut attached = false;
            let mut remaining = VecDeque::with_capacity(pool.len());
            while let Some(candidate) = pool.pop_front() {
                if chain.try_attach(&candidate) {
                    attached = true;
                } else {
                    remaining.push_back(candidate);
                }
            }
            pool = remaining;
            if !attached || pool.is_empty() {
                break;
            }
        }
        chains.push(chain.ways.into());
    }
    chains
}

/// Gathers raw OSM elements and turns them into joined collections.
///
/// Nodes and ways may arrive in any order; coordinates are only resolved in
/// [`WayCollector::finish`].
pub struct WayCollector {
    config: CollectorConfig,
    positions: HashMap<OsmId, (f64, f64)>,
    tagged_nodes: HashMap<OsmId, Arc<Node>>,
    ways: Vec<RawWay>,
    skipped: usize,
}

impl WayCollector {
    pub fn new(config: CollectorConfig) -> Self {
        WayCollector {
            config,
            positions: HashMap::new(),
            tagged_nodes: HashMap::new(),
            ways: Vec::new(),
            skipped: 0,
        }
    }

    fn accepts(&self, way: &RawWay) -> bool {
        let Some(highway) = way.tags.get("highway") else {
            return false;
        };
        if !self.config.highway_types.is_empty() && !self.config.highway_types.contains(highway) {
            return false;
        }
        match way.tags.get("surface") {
            Some(surface) => !self.config.ignored_surfaces.contains(surface),
            None => true,
        }
    }

    pub fn add_node(&mut self, node: RawNode) {
        self.positions.insert(node.id, (node.lat, node.lon));
        if self.config.node_tags.iter().any(|key| node.tags.contains_key(key)) {
            let node = Node {
                id: node.id,
                lat: node.lat,
                lon: node.lon,
                tags: node.tags,
            };
            self.tagged_nodes.insert(node.id, Arc::new(node));
        }
    }

    pub fn add_way(&mut self, way: RawWay) {
        if !self.accepts(&way) {
            return;
        }
        if way.refs.len() < 2 {
            warn!(way_id = way.id; "Skipping way with fewer than two nodes");
            self.skipped += 1;
            return;
        }
        if way.refs.first() == way.refs.last() {
            warn!(way_id = way.id; "Skipping closed way");
            self.skipped += 1;
            return;
        }
        self.ways.push(way);
    }

    pub fn add(&mut self, element: OsmElement) {
        match element {
            OsmElement::Node(node) => self.add_node(node),
            OsmElement::Way(way) => self.add_way(way),
        }
    }

    /// Feed every element of `elements` and join the result.
    pub fn collect<I>(mut self, elements: I) -> Result<Vec<Collection>>
    where
        I: IntoIterator<Item = Result<OsmElement>>,
    {
        for element in elements {
            self.add(element?);
        }
        Ok(self.finish())
    }

    fn resolve(&self, way: RawWay) -> Option<Way> {
        let mut coords = Vec::with_capacity(way.refs.len());
        for node_id in &way.refs {
            let coord = match self.tagged_nodes.get(node_id) {
                Some(node) => Coordinate::with_node(Arc::clone(node)),
                None => {
                    let &(lat, lon) = self.positions.get(node_id)?;
                    Coordinate::new(lat, lon)
                }
            };
            coords.push(coord);
        }
        Some(Way::new(way.id, way.tags, way.refs, coords))
    }

    fn route_keys(way: &Way) -> Vec<RouteKey> {
        if let Some(refs) = way.tag("ref") {
            let mut keys: Vec<RouteKey> = Vec::new();
            for route in refs.split(';').map(str::trim).filter(|r| !r.is_empty()) {
                let key = RouteKey {
                    join_type: JoinType::Ref,
                    join_data: route.to_string(),
                };
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            if !keys.is_empty() {
                return keys;
            }
        }
        match way.tag("name") {
            Some(name) if !name.is_empty() => vec![RouteKey {
                join_type: JoinType::Name,
                join_data: name.to_string(),
            }],
            _ => Vec::new(),
        }
    }

    /// Resolve coordinates, group and join. Singleton collections come first in
    /// input order, then the route groups ordered by join type and value.
    pub fn finish(mut self) -> Vec<Collection> {
        let raw_ways = std::mem::take(&mut self.ways);
        let accepted = raw_ways.len();
        let mut singletons = Vec::new();
        let mut routes: BTreeMap<RouteKey, Vec<Arc<Way>>> = BTreeMap::new();

        for raw_way in raw_ways {
            let way_id = raw_way.id;
            let Some(way) = self.resolve(raw_way) else {
                warn!(way_id = way_id; "Skipping way referencing a node without a location");
                self.skipped += 1;
                continue;
            };
            let keys = Self::route_keys(&way);
            if keys.is_empty() {
                singletons.push(Collection::new(JoinType::None, None, vec![way]));
                continue;
            }
            let way = Arc::new(way);
            for key in keys {
                routes.entry(key).or_default().push(Arc::clone(&way));
            }
        }

        let num_groups = routes.len();
        let mut collections = singletons;
        for (key, ways) in routes {
            let group_size = ways.len();
            let chains = join_group(ways);
            debug!(join_data = key.join_data.as_str(), ways = group_size, collections = chains.len(); "Joined route group");
            for chain in chains {
                collections.push(Collection::new(key.join_type, Some(key.join_data.clone()), chain));
            }
        }

        info!(
            accepted_ways = accepted,
            skipped_ways = self.skipped,
            route_groups = num_groups,
            collections = collections.len();
            "Collected ways"
        );
        collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Tags;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn node(id: OsmId, lat: f64, lon: f64) -> OsmElement {
        OsmElement::Node(RawNode { id, lat, lon, tags: Tags::new() })
    }

    fn road(id: OsmId, refs: &[OsmId], extra: &[(&str, &str)]) -> OsmElement {
        let mut tags = tags(&[("highway", "secondary")]);
        tags.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        OsmElement::Way(RawWay { id, tags, refs: refs.to_vec() })
    }

    fn nodes() -> Vec<OsmElement> {
        (1..=20).map(|id| node(id, 44.0 + id as f64 * 0.001, -73.0 + (id % 3) as f64 * 0.001)).collect()
    }

    fn collect(elements: Vec<OsmElement>) -> Vec<Collection> {
        WayCollector::new(CollectorConfig::default())
            .collect(elements.into_iter().map(Ok))
            .unwrap()
    }

    fn assert_contiguous(collection: &Collection) {
        for pair in collection.ways.windows(2) {
            assert_eq!(pair[0].last_ref(), pair[1].first_ref());
            assert_eq!(pair[0].coords.last(), pair[1].coords.first());
        }
    }

    fn ordered_refs(collection: &Collection) -> Vec<OsmId> {
        let mut refs = vec![collection.ways[0].first_ref()];
        for way in &collection.ways {
            refs.extend(&way.refs[1..]);
        }
        refs
    }

    // A=1, B=2, C=3, D=4, E=5
    fn main_street(order: &[usize]) -> Vec<OsmElement> {
        let ways = [
            road(10, &[1, 2], &[("name", "Main Street")]),
            road(11, &[2, 3], &[("name", "Main Street")]),
            road(12, &[4, 3], &[("name", "Main Street")]),
            road(13, &[4, 5], &[("name", "Main Street")]),
        ];
        let mut elements: Vec<OsmElement> = order.iter().map(|&i| ways[i].clone()).collect();
        elements.extend(nodes());
        elements
    }

    #[test]
    fn joins_reversed_way_into_one_line() {
        let collections = collect(main_street(&[0, 1, 2, 3]));
        assert_eq!(collections.len(), 1);
        let collection = &collections[0];
        assert_eq!(collection.join_type, JoinType::Name);
        assert_eq!(collection.join_data.as_deref(), Some("Main Street"));
        assert_eq!(ordered_refs(collection), vec![1, 2, 3, 4, 5]);
        assert_eq!(collection.ways[2].id, 12);
        assert_eq!(collection.ways[2].refs, vec![3, 4]);
        assert_contiguous(collection);
    }

    #[test]
    fn join_is_independent_of_input_order() {
        for order in [[3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]] {
            let collections = collect(main_street(&order));
            assert_eq!(collections.len(), 1);
            let refs = ordered_refs(&collections[0]);
            assert!(refs == vec![1, 2, 3, 4, 5] || refs == vec![5, 4, 3, 2, 1], "{:?}", refs);
        }
    }

    #[test]
    fn nodes_may_arrive_after_ways() {
        let mut elements = nodes();
        elements.extend(main_street(&[0, 1, 2, 3]).into_iter().filter(|e| matches!(e, OsmElement::Way(_))));
        assert_eq!(collect(elements).len(), 1);
    }

    #[test]
    fn refuses_forks() {
        // 2 -> 3 and 2 -> 6 both leave B; only one can continue the chain.
        let mut elements = vec![
            road(1, &[1, 2], &[("ref", "VT 100")]),
            road(2, &[2, 3], &[("ref", "VT 100")]),
            road(3, &[2, 6], &[("ref", "VT 100")]),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 2);
        assert_eq!(ordered_refs(&collections[0]), vec![1, 2, 3]);
        assert_eq!(ordered_refs(&collections[1]), vec![2, 6]);
    }

    #[test]
    fn refuses_to_close_a_loop() {
        let mut elements = vec![
            road(1, &[1, 2], &[("name", "Loop Road")]),
            road(2, &[2, 3], &[("name", "Loop Road")]),
            road(3, &[3, 1], &[("name", "Loop Road")]),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 2);
        for collection in &collections {
            let refs = ordered_refs(collection);
            let unique: HashSet<_> = refs.iter().collect();
            assert_eq!(unique.len(), refs.len());
        }
    }

    #[test]
    fn shared_way_is_copied_per_route() {
        let mut elements = vec![
            road(1, &[1, 2], &[("ref", "US 2;VT 100")]),
            road(2, &[3, 2], &[("ref", "US 2")]),
            road(3, &[4, 1], &[("ref", "VT 100")]),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].join_data.as_deref(), Some("US 2"));
        assert_eq!(ordered_refs(&collections[0]), vec![1, 2, 3]);
        assert_eq!(collections[1].join_data.as_deref(), Some("VT 100"));
        assert_eq!(ordered_refs(&collections[1]), vec![4, 1, 2]);
        assert_eq!(collections[1].ways[1].refs, vec![1, 2]);
    }

    #[test]
    fn unnamed_ways_are_singletons_first() {
        let mut elements = vec![
            road(1, &[1, 2], &[("name", "Main Street")]),
            road(2, &[5, 6], &[]),
            road(3, &[7, 8], &[("name", "")]),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 3);
        assert_eq!(collections[0].join_type, JoinType::None);
        assert_eq!(collections[0].ways[0].id, 2);
        assert_eq!(collections[1].ways[0].id, 3);
        assert_eq!(collections[2].join_type, JoinType::Name);
    }

    #[test]
    fn skips_unusable_ways() {
        let mut elements = vec![
            road(1, &[1, 2, 3, 1], &[("name", "Ring")]),
            road(2, &[4], &[("name", "Stub")]),
            road(3, &[5, 99], &[("name", "Broken")]),
            road(4, &[6, 7], &[("name", "Fine")]),
            OsmElement::Way(RawWay { id: 5, tags: tags(&[("name", "Trail")]), refs: vec![8, 9] }),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].ways[0].id, 4);
    }

    #[test]
    fn filters_on_highway_type_and_surface() {
        let config = CollectorConfig {
            highway_types: vec!["secondary".into(), "track".into()],
            ignored_surfaces: vec!["gravel".into()],
            ..CollectorConfig::default()
        };
        let mut elements = vec![
            road(1, &[1, 2], &[("surface", "asphalt")]),
            road(2, &[2, 3], &[("surface", "gravel")]),
            OsmElement::Way(RawWay { id: 3, tags: tags(&[("highway", "footway")]), refs: vec![3, 4] }),
            OsmElement::Way(RawWay { id: 4, tags: tags(&[("highway", "track")]), refs: vec![4, 5] }),
        ];
        elements.extend(nodes());
        let collections = WayCollector::new(config).collect(elements.into_iter().map(Ok)).unwrap();
        let ids: Vec<OsmId> = collections.iter().map(|c| c.ways[0].id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn main_line_is_joined_before_ramps_and_roundabouts() {
        let mut elements = vec![
            road(1, &[1, 2], &[("ref", "NH 16"), ("junction", "roundabout")]),
            road(2, &[2, 3], &[("ref", "NH 16")]),
            road(3, &[3, 4], &[("ref", "NH 16")]),
            road(4, &[2, 6], &[("ref", "NH 16"), ("highway", "primary_link")]),
        ];
        elements.extend(nodes());
        let collections = collect(elements);
        assert_eq!(collections.len(), 2);
        let main_line: Vec<OsmId> = collections[0].ways.iter().map(|w| w.id).collect();
        assert_eq!(main_line, vec![4, 2, 3]);
        assert_eq!(collections[1].ways[0].id, 1);
    }

    #[test]
    fn tagged_nodes_are_kept_on_coordinates() {
        let mut elements = vec![road(1, &[1, 2, 3], &[("name", "Stop Street")])];
        elements.extend(nodes().into_iter().map(|element| match element {
            OsmElement::Node(mut node) if node.id == 2 => {
                node.tags.insert("highway".into(), "stop".into());
                OsmElement::Node(node)
            }
            other => other,
        }));
        let collections = collect(elements);
        let coords = &collections[0].ways[0].coords;
        assert!(coords[0].node.is_none());
        let stop = coords[1].node.as_ref().unwrap();
        assert_eq!(stop.id, 2);
        assert_eq!(stop.tags.get("highway").map(String::as_str), Some("stop"));
    }
}
