use crate::error::GeneError;
use crate::quantification::region_metrics::{compute_region_metrics, positive_mean, RegionMetrics};
use crate::table::GeneTable;
use crate::{RateKind, Region, RegionKey, Sample};

/// Per-gene metrics for one sample: one [`RegionMetrics`] per region, in
/// [`Region::ALL`] order, and the gene-level totals.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneRecord {
    pub gene_name: String,
    pub regions: [RegionMetrics; 4],
    /// Mean of the region CPMs that are positive.
    pub total_cpm: f64,
    /// Mean of the four region rates.
    pub total_ai_rate: f64,
    pub total_m6a_rate: f64,
    pub total_either_rate: f64,
}

impl GeneRecord {
    pub fn region(&self, region: Region) -> &RegionMetrics {
        &self.regions[region.index()]
    }

    /// CPM under a column prefix. `None` for a region the gene table did not
    /// contain, which makes the value missing rather than zero downstream.
    pub fn cpm(&self, key: RegionKey) -> Option<f64> {
        match key.region() {
            Some(region) => self.region(region).cpm_value(),
            None => Some(self.total_cpm),
        }
    }

    pub fn rate(&self, key: RegionKey, kind: RateKind) -> f64 {
        match key.region() {
            Some(region) => self.region(region).rate(kind),
            None => match kind {
                RateKind::Ai => self.total_ai_rate,
                RateKind::M6a => self.total_m6a_rate,
                RateKind::Either => self.total_either_rate,
            },
        }
    }

    /// Names of the flattened columns, in the order of [`GeneRecord::columns`].
    ///
    /// ```rust
    /// use mod_rate::quantification::gene_record::GeneRecord;
    ///
    /// let names = GeneRecord::column_names();
    /// assert_eq!(names.len(), 4 * 5 + 4);
    /// assert_eq!(names[0], "utr5_cpm");
    /// assert_eq!(names[3], "utr5_unmod_rate");
    /// assert_eq!(names.last().map(String::as_str), Some("total_either_rate"));
    /// ```
    pub fn column_names() -> Vec<String> {
        let mut names = Vec::with_capacity(24);
        for region in Region::ALL {
            let key = region.key();
            names.push(key.cpm_column());
            names.push(key.rate_column(RateKind::Ai));
            names.push(key.rate_column(RateKind::M6a));
            names.push(format!("{}_unmod_rate", key.prefix()));
            names.push(key.rate_column(RateKind::Either));
        }
        names.push(RegionKey::Total.cpm_column());
        for kind in RateKind::ALL {
            names.push(RegionKey::Total.rate_column(kind));
        }
        names
    }

    /// The record flattened into region-prefixed values, matching
    /// [`GeneRecord::column_names`]. A missing CPM is `None`.
    pub fn values(&self) -> Vec<Option<f64>> {
        let mut values = Vec::with_capacity(24);
        for metrics in &self.regions {
            values.push(metrics.cpm_value());
            values.push(Some(metrics.ai_rate));
            values.push(Some(metrics.m6a_rate));
            values.push(Some(metrics.unmod_rate));
            values.push(Some(metrics.either_rate));
        }
        values.push(Some(self.total_cpm));
        values.push(Some(self.total_ai_rate));
        values.push(Some(self.total_m6a_rate));
        values.push(Some(self.total_either_rate));
        values
    }

    /// Pairs of column name and value.
    pub fn columns(&self) -> impl Iterator<Item = (String, Option<f64>)> {
        Self::column_names().into_iter().zip(self.values())
    }
}

/// Aggregates one gene for one sample.
///
/// Every region slot is filled before the totals are taken, so a region with
/// no rows adds a zero to each rate total while staying out of the CPM total.
pub fn compute_gene_record(
    gene: &str,
    table: &GeneTable,
    sample: Sample,
) -> Result<GeneRecord, GeneError> {
    if !table.has_sample(sample) {
        return Err(GeneError::MissingSample {
            gene: gene.to_string(),
            sample,
        });
    }

    let regions = Region::ALL.map(|region| compute_region_metrics(table, region, sample));

    let total_cpm = positive_mean(regions.iter().filter(|m| m.present).map(|m| m.cpm));
    let total_rate = |kind: RateKind| {
        regions.iter().map(|m| m.rate(kind)).sum::<f64>() / regions.len() as f64
    };

    Ok(GeneRecord {
        gene_name: gene.to_string(),
        total_cpm,
        total_ai_rate: total_rate(RateKind::Ai),
        total_m6a_rate: total_rate(RateKind::M6a),
        total_either_rate: total_rate(RateKind::Either),
        regions,
    })
}
