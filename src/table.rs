use std::collections::HashMap;

use crate::error::RateParseError;
use crate::parsers::rate_parser::RateCell;
use crate::{Modification, Region, Sample};

/// One replicate's columns of a raw table row.
///
/// `cpk` and `count` are `None` when the cell was empty. The rate cell keeps
/// its parse result so callers decide how a bad cell is treated.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub cpk: Option<f64>,
    pub count: Option<u64>,
    pub rate: Result<RateCell, RateParseError>,
}

impl Measurement {
    /// A replicate with no data at all.
    pub fn missing() -> Self {
        Self {
            cpk: None,
            count: None,
            rate: Err(RateParseError::Empty),
        }
    }
}

/// One row of a gene table: a (feature, modification) pair and the
/// measurements of both replicates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurementRow {
    pub feature: Region,
    pub modification: Modification,
    pub replicates: [Measurement; 2],
}

impl RawMeasurementRow {
    /// CPK values this sample reads from the row, skipping empty cells.
    pub fn cpks(&self, sample: Sample) -> impl Iterator<Item = f64> + '_ {
        sample
            .replicate_indices()
            .iter()
            .filter_map(move |&i| self.replicates[i].cpk)
    }

    /// Rate of the row for a sample. The pooled rate is the mean of both
    /// replicates and fails if either of them does.
    pub fn rate(&self, sample: Sample) -> Result<f64, RateParseError> {
        let indices = sample.replicate_indices();
        let mut total = 0.0;
        for &i in indices {
            let cell = self.replicates[i].rate.as_ref().map_err(|e| e.clone())?;
            total += cell.mean();
        }
        Ok(total / indices.len() as f64)
    }

    /// Read count of the row for a sample, summed when pooled.
    pub fn count(&self, sample: Sample) -> Option<u64> {
        sample
            .replicate_indices()
            .iter()
            .filter_map(|&i| self.replicates[i].count)
            .reduce(|a, b| a + b)
    }

    /// CPK of the row for a sample, averaged when pooled.
    pub fn cpk(&self, sample: Sample) -> Option<f64> {
        let values: Vec<f64> = self.cpks(sample).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// The raw table of a single gene, indexed by region and
/// (region, modification) so lookups do not rescan the rows.
///
/// # Example
///
/// ```rust
/// use mod_rate::table::{GeneTable, Measurement, RawMeasurementRow};
/// use mod_rate::{Modification, Region};
///
/// let row = |feature, modification| RawMeasurementRow {
///     feature,
///     modification,
///     replicates: [Measurement::missing(), Measurement::missing()],
/// };
///
/// let table = GeneTable::new(
///     vec![
///         row(Region::Exon, Modification::Unmod),
///         row(Region::Exon, Modification::M6a),
///         row(Region::Intron, Modification::M6a),
///     ],
///     [true, true],
/// );
///
/// assert_eq!(table.region_rows(Region::Exon).count(), 2);
/// assert_eq!(table.region_rows(Region::Utr5).count(), 0);
/// assert!(table.first(Region::Intron, Modification::M6a).is_some());
/// assert!(table.first(Region::Intron, Modification::Inosine).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GeneTable {
    rows: Vec<RawMeasurementRow>,
    replicates: [bool; 2],
    by_region: HashMap<Region, Vec<usize>>,
    by_pair: HashMap<(Region, Modification), Vec<usize>>,
}

impl GeneTable {
    /// Builds the table and its indices. `replicates` records which
    /// replicate columns the source table carried.
    pub fn new(rows: Vec<RawMeasurementRow>, replicates: [bool; 2]) -> Self {
        let mut by_region: HashMap<Region, Vec<usize>> = HashMap::new();
        let mut by_pair: HashMap<(Region, Modification), Vec<usize>> = HashMap::new();

        for (i, row) in rows.iter().enumerate() {
            by_region.entry(row.feature).or_default().push(i);
            by_pair
                .entry((row.feature, row.modification))
                .or_default()
                .push(i);
        }

        Self {
            rows,
            replicates,
            by_region,
            by_pair,
        }
    }

    pub fn rows(&self) -> &[RawMeasurementRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the source table carried every column this sample reads.
    pub fn has_sample(&self, sample: Sample) -> bool {
        sample
            .replicate_indices()
            .iter()
            .all(|&i| self.replicates[i])
    }

    /// Rows of a region, in table order.
    pub fn region_rows(&self, region: Region) -> impl Iterator<Item = &RawMeasurementRow> + '_ {
        self.by_region
            .get(&region)
            .into_iter()
            .flatten()
            .map(|&i| &self.rows[i])
    }

    /// First row of a (region, modification) pair, in table order.
    pub fn first(&self, region: Region, modification: Modification) -> Option<&RawMeasurementRow> {
        self.by_pair
            .get(&(region, modification))
            .and_then(|indices| indices.first())
            .map(|&i| &self.rows[i])
    }
}
