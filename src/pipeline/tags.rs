//! Stages that drop or split ways by their tags.

use crate::data::{Collection, Way};

use super::{split_each, CollectionStream, Field, Stage, COLLECTION_ROLL_UPS};

/// Build sections of `collection` from consecutive runs of ways that share a
/// key. Ways keyed `None` are dropped and end the current run.
fn split_runs<K, F>(collection: Collection, mut key: F) -> Vec<Collection>
where
    K: PartialEq,
    F: FnMut(&Way) -> Option<K>,
{
    let template = collection.section();
    let mut sections = Vec::new();
    let mut current: Option<(K, Vec<Way>)> = None;
    for way in collection.ways {
        let way_key = key(&way);
        let continues_run = match (&current, &way_key) {
            (Some((run_key, _)), Some(way_key)) => run_key == way_key,
            _ => false,
        };
        if continues_run {
            if let Some((_, ways)) = current.as_mut() {
                ways.push(way);
            }
            continue;
        }
        if let Some((_, ways)) = current.take() {
            let mut section = template.clone();
            section.ways = ways;
            sections.push(section);
        }
        current = way_key.map(|k| (k, vec![way]));
    }
    if let Some((_, ways)) = current {
        let mut section = template;
        section.ways = ways;
        sections.push(section);
    }
    sections
}

pub struct FilterOutWaysWithTag {
    tag: String,
    values: Vec<String>,
    filter_out_ways_missing_tag: bool,
}

impl FilterOutWaysWithTag {
    pub const STAGE_NAME: &'static str = "filter_out_ways_with_tag";

    pub fn new(tag: String, values: Vec<String>, filter_out_ways_missing_tag: bool) -> Self {
        FilterOutWaysWithTag {
            tag,
            values,
            filter_out_ways_missing_tag,
        }
    }

    fn way_matches(&self, way: &Way) -> bool {
        match way.tag(&self.tag) {
            Some(value) => self.values.iter().any(|v| v == value),
            None => self.filter_out_ways_missing_tag,
        }
    }

    /// Remove matching ways, cutting the collection where they were.
    pub fn filter(&self, collection: Collection) -> Vec<Collection> {
        split_runs(collection, |way| (!self.way_matches(way)).then_some(()))
    }
}

impl Stage for FilterOutWaysWithTag {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn invalidates(&self) -> &'static [Field] {
        COLLECTION_ROLL_UPS
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        split_each(input, move |collection| Ok(self.filter(collection)))
    }
}

/// Keeps only ways with one of `values` for a tag, cutting the collection
/// where other ways were.
pub struct FilterOnlyWaysWithTag {
    tag: String,
    values: Vec<String>,
    skip_ways_missing_tag: bool,
}

impl FilterOnlyWaysWithTag {
    pub const STAGE_NAME: &'static str = "filter_only_ways_with_tag";

    pub fn new(tag: String, values: Vec<String>, skip_ways_missing_tag: bool) -> Self {
        FilterOnlyWaysWithTag {
            tag,
            values,
            skip_ways_missing_tag,
        }
    }

    fn way_matches(&self, way: &Way) -> bool {
        match way.tag(&self.tag) {
            Some(value) => self.values.iter().any(|v| v == value),
            None => !self.skip_ways_missing_tag,
        }
    }

    pub fn filter(&self, collection: Collection) -> Vec<Collection> {
        split_runs(collection, |way| self.way_matches(way).then_some(()))
    }
}

impl Stage for FilterOnlyWaysWithTag {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn invalidates(&self) -> &'static [Field] {
        COLLECTION_ROLL_UPS
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        split_each(input, move |collection| Ok(self.filter(collection)))
    }
}

/// Splits collections wherever ways move into or out of a group of tag values.
pub struct SplitCollectionsOnTag {
    tag: String,
    group: Vec<String>,
    exclude_ways_missing_tag: bool,
}

impl SplitCollectionsOnTag {
    pub const STAGE_NAME: &'static str = "split_collections_on_tag";

    pub fn new(tag: String, group: Vec<String>, exclude_ways_missing_tag: bool) -> Self {
        SplitCollectionsOnTag {
            tag,
            group,
            exclude_ways_missing_tag,
        }
    }

    fn in_group(&self, way: &Way) -> bool {
        match way.tag(&self.tag) {
            Some(value) => self.group.iter().any(|v| v == value),
            None => !self.exclude_ways_missing_tag,
        }
    }

    pub fn split(&self, collection: Collection) -> Vec<Collection> {
        split_runs(collection, |way| Some(self.in_group(way)))
    }
}

impl Stage for SplitCollectionsOnTag {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn invalidates(&self) -> &'static [Field] {
        COLLECTION_ROLL_UPS
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        split_each(input, move |collection| Ok(self.split(collection)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{collection::fixtures::way, JoinType};

    fn tagged_way(id: i64, key: &str, value: Option<&str>) -> Way {
        let mut way = way(id, &[id, id + 1], &[(44.0, -73.0), (44.001, -73.0)]);
        way.tags.remove(key);
        if let Some(value) = value {
            way.tags.insert(key.to_string(), value.to_string());
        }
        way
    }

    fn ids(sections: &[Collection]) -> Vec<Vec<i64>> {
        sections
            .iter()
            .map(|section| section.ways.iter().map(|way| way.id).collect())
            .collect()
    }

    fn surfaces() -> Collection {
        let mut collection = Collection::new(
            JoinType::Name,
            Some("Raymond Road".into()),
            vec![
                tagged_way(1, "surface", Some("asphalt")),
                tagged_way(2, "surface", Some("gravel")),
                tagged_way(3, "surface", Some("asphalt")),
                tagged_way(4, "surface", None),
                tagged_way(5, "surface", Some("dirt")),
            ],
        );
        collection.length = Some(5.0);
        collection
    }

    #[test]
    fn filtering_out_ways_splits_around_them() {
        let stage = FilterOutWaysWithTag::new("surface".into(), vec!["gravel".into(), "dirt".into()], false);
        let result = stage.filter(surfaces());
        assert_eq!(ids(&result), vec![vec![1], vec![3, 4]]);
        assert!(result.iter().all(|c| c.join_data.as_deref() == Some("Raymond Road")));
        assert!(result.iter().all(|c| c.length.is_none()));
    }

    #[test]
    fn filtering_out_ways_missing_the_tag() {
        let stage = FilterOutWaysWithTag::new("surface".into(), vec!["gravel".into(), "dirt".into()], true);
        assert_eq!(ids(&stage.filter(surfaces())), vec![vec![1], vec![3]]);
    }

    #[test]
    fn nothing_left_after_filtering() {
        let stage = FilterOutWaysWithTag::new("surface".into(), vec!["asphalt".into()], true);
        let only_asphalt = Collection::new(JoinType::None, None, vec![tagged_way(1, "surface", Some("asphalt"))]);
        assert!(stage.filter(only_asphalt).is_empty());
    }

    #[test]
    fn filtering_only_paved_ways() {
        let stage = FilterOnlyWaysWithTag::new("surface".into(), vec!["asphalt".into(), "paved".into()], false);
        let result = stage.filter(surfaces());
        assert_eq!(ids(&result), vec![vec![1], vec![3, 4]]);
        assert!(result.iter().all(|c| c.length.is_none()));

        let stage = FilterOnlyWaysWithTag::new("surface".into(), vec!["asphalt".into(), "paved".into()], true);
        assert_eq!(ids(&stage.filter(surfaces())), vec![vec![1], vec![3]]);
    }

    #[test]
    fn splitting_on_group_changes() {
        let collection = Collection::new(
            JoinType::Name,
            Some("Old Mountain Road".into()),
            vec![
                tagged_way(1, "highway", Some("unclassified")),
                tagged_way(2, "highway", None),
                tagged_way(3, "highway", Some("track")),
                tagged_way(4, "highway", Some("path")),
                tagged_way(5, "highway", Some("unclassified")),
            ],
        );
        let group = vec!["unclassified".to_string(), "tertiary".to_string()];
        let result = SplitCollectionsOnTag::new("highway".into(), group.clone(), false).split(collection.clone());
        assert_eq!(ids(&result), vec![vec![1, 2], vec![3, 4], vec![5]]);

        let result = SplitCollectionsOnTag::new("highway".into(), group, true).split(collection);
        assert_eq!(ids(&result), vec![vec![1], vec![2, 3, 4], vec![5]]);
    }
}
