use crate::{
    data::Collection,
    errors::{Error, Result},
    geometry::BoundingBox,
};

use super::{filter_each, map_each, CollectionStream, Field, Stage};

/// Records the extent of every collection's coordinates.
pub struct AddBoundingBox;

impl AddBoundingBox {
    pub const STAGE_NAME: &'static str = "add_bounding_box";

    pub fn bounding_box(collection: &Collection) -> Option<BoundingBox> {
        let mut coords = collection.ways.iter().flat_map(|way| way.coords.iter());
        let first = coords.next()?;
        let mut bbox = BoundingBox::around(first.lat, first.lon);
        for coord in coords {
            bbox.extend(coord.lat, coord.lon);
        }
        Some(bbox)
    }

    fn add(mut collection: Collection) -> Result<Collection> {
        collection.bounds = Some(Self::bounding_box(&collection).ok_or_else(|| {
            Error::invalid(format!("{}: collection has no coordinates", Self::STAGE_NAME))
        })?);
        Ok(collection)
    }
}

impl Stage for AddBoundingBox {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn produces(&self) -> &'static [Field] {
        &[Field::BoundingBox]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        map_each(input, AddBoundingBox::add)
    }
}

/// Keeps only collections whose bounding box intersects an area.
pub struct FilterCollectionsByBounds {
    area: BoundingBox,
}

impl FilterCollectionsByBounds {
    pub const STAGE_NAME: &'static str = "filter_collections_by_bounds";

    pub fn new(area: BoundingBox) -> Self {
        FilterCollectionsByBounds { area }
    }

    fn keep(&self, collection: &Collection) -> Result<bool> {
        let bounds = collection
            .bounds
            .ok_or_else(|| Error::missing_field(Self::STAGE_NAME, Field::BoundingBox))?;
        Ok(bounds.intersects(&self.area))
    }
}

impl Stage for FilterCollectionsByBounds {
    fn name(&self) -> &'static str {
        Self::STAGE_NAME
    }

    fn requires(&self) -> &'static [Field] {
        &[Field::BoundingBox]
    }

    fn process<'a>(&'a self, input: CollectionStream<'a>) -> CollectionStream<'a> {
        filter_each(input, move |collection| self.keep(collection))
    }
}
