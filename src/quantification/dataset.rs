use indexmap::IndexMap;
use log::{info, warn};
use rayon::prelude::*;

use crate::quantification::gene_record::{compute_gene_record, GeneRecord};
use crate::table::GeneTable;
use crate::{RateKind, RegionKey, Sample};

/// All gene records of one sample, in the order the genes were supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDataset {
    pub sample: Sample,
    pub records: Vec<GeneRecord>,
}

impl SampleDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any gene carries a CPM under `key`. Regions that no gene
    /// contains have no CPM column at all.
    pub fn has_cpm_column(&self, key: RegionKey) -> bool {
        self.records.iter().any(|record| record.cpm(key).is_some())
    }

    /// Rate columns are filled for every gene, so they exist as soon as the
    /// dataset has a record.
    pub fn has_rate_column(&self, _key: RegionKey, _kind: RateKind) -> bool {
        !self.records.is_empty()
    }

    /// Paired `(rate * scale, cpm)` values across genes, dropping genes whose
    /// CPM is missing.
    pub fn rate_cpm_pairs(&self, key: RegionKey, kind: RateKind, scale: f64) -> (Vec<f64>, Vec<f64>) {
        self.records
            .iter()
            .filter_map(|record| {
                record
                    .cpm(key)
                    .map(|cpm| (record.rate(key, kind) * scale, cpm))
            })
            .unzip()
    }
}

/// Builds the dataset of one sample from the gene tables.
///
/// Genes are aggregated on the rayon pool; the records keep the map's order.
/// A gene that cannot be aggregated is reported and left out.
pub fn build_sample_dataset(genes: &IndexMap<String, GeneTable>, sample: Sample) -> SampleDataset {
    let entries: Vec<(&String, &GeneTable)> = genes.iter().collect();

    let results: Vec<_> = entries
        .par_iter()
        .map(|(gene, table)| compute_gene_record(gene, table, sample))
        .collect();

    let mut records = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!("Error processing gene: {}", e),
        }
    }

    info!(
        "Created {} dataset with {} of {} genes",
        sample,
        records.len(),
        genes.len()
    );
    SampleDataset { sample, records }
}
