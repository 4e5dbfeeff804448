//! Record builder: paired objects into the image → region → nucleus hierarchy.

use crate::filename::RoiDescriptor;
use crate::model::{Dataset, ImageRecord, NucleusRecord, PairedObject, RegionRecord};
use crate::schema::NucleusColumn;

/// Merge a paired object into one nucleus entry.
///
/// Identity, Xmin, Ymin and the centroid come from meta; Xmax and Ymax from
/// props; exclusive fields from their own dataset, minus `slide` and
/// `roiname` (see [`Schema::nucleus_columns`](crate::Schema::nucleus_columns)).
/// Null values are left out.
pub fn build_nucleus(pair: &PairedObject, columns: &[NucleusColumn]) -> NucleusRecord {
    let mut nucleus = NucleusRecord::new();
    for column in columns {
        let row = match column.dataset {
            Dataset::Meta => &pair.meta,
            Dataset::Props => &pair.props,
        };
        if let Some(value) = row.get(&column.source) {
            nucleus.insert(column.name.clone(), value.clone());
        }
    }
    nucleus
}

impl RegionRecord {
    pub fn from_descriptor(roi: &RoiDescriptor) -> Self {
        Self {
            name: roi.region_name.clone(),
            left: roi.left,
            top: roi.top,
            right: roi.right,
            bottom: roi.bottom,
            nuclei: Vec::new(),
        }
    }

    pub fn push_nucleus(&mut self, nucleus: NucleusRecord) {
        self.nuclei.push(nucleus);
    }
}

impl ImageRecord {
    pub fn new(image_name: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            regions: Vec::new(),
        }
    }

    pub fn push_region(&mut self, region: RegionRecord) {
        self.regions.push(region);
    }

    pub fn nucleus_count(&self) -> usize {
        self.regions.iter().map(|r| r.nuclei.len()).sum()
    }
}
