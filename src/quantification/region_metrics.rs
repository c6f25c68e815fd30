use log::debug;

use crate::table::GeneTable;
use crate::{Modification, RateKind, Region, Sample};

/// Metrics of one region of one gene, for one sample.
///
/// `present` is false when the gene table had no row for the region. Such a
/// region reports a CPM of 0 and zero rates; it is left out of the gene's CPM
/// total (see [`crate::quantification::gene_record`]) but still counts as a
/// zero in the rate totals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionMetrics {
    pub present: bool,
    pub cpm: f64,
    pub ai_rate: f64,
    pub m6a_rate: f64,
    pub unmod_rate: f64,
    pub either_rate: f64,
}

impl RegionMetrics {
    /// Metrics of a region without rows.
    pub fn absent() -> Self {
        Self::default()
    }

    /// The CPM, or `None` when the region is not present.
    pub fn cpm_value(&self) -> Option<f64> {
        self.present.then_some(self.cpm)
    }

    pub fn rate(&self, kind: RateKind) -> f64 {
        match kind {
            RateKind::Ai => self.ai_rate,
            RateKind::M6a => self.m6a_rate,
            RateKind::Either => self.either_rate,
        }
    }
}

/// Probability of either modification, capped at 1.
pub fn either_rate(ai_rate: f64, m6a_rate: f64) -> f64 {
    (ai_rate + m6a_rate).min(1.0)
}

/// Mean of the strictly positive values, 0 if there are none. NaN never
/// passes the filter.
pub fn positive_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Computes the metrics of `region` for `sample` from a gene table.
///
/// The CPM is the mean of the positive CPK values of every row in the region.
/// Each rate comes from the first row of the matching modification; missing
/// rows and unparseable cells give a rate of 0.
///
/// # Example
///
/// ```rust
/// use mod_rate::parsers::gene_table_parser::parse_delimited;
/// use mod_rate::config::SampleLabels;
/// use mod_rate::quantification::region_metrics::compute_region_metrics;
/// use mod_rate::{Region, Sample};
/// use std::path::Path;
///
/// let text = "Feature\tModification\tCPK_MR01_1\tCount_MR01_1\tMR01_1\n\
///             UTR_5\tInosine\t12.0\t3\t0.050 ± 0.010\n\
///             UTR_5\tm6A\t0\t0\t0.030 ± 0.005\n\
///             UTR_5\tUnmod\t0\t0\t0.920 ± 0.011\n";
/// let table = parse_delimited(text.as_bytes(), b'\t', &SampleLabels::default(), Path::new("AZIN1.tsv")).unwrap();
///
/// let utr5 = compute_region_metrics(&table, Region::Utr5, Sample::Rep1);
/// assert_eq!(utr5.cpm, 12.0);
/// assert_eq!(utr5.ai_rate, 0.05);
/// assert_eq!(utr5.m6a_rate, 0.03);
/// assert!((utr5.either_rate - 0.08).abs() < 1e-12);
///
/// let intron = compute_region_metrics(&table, Region::Intron, Sample::Rep1);
/// assert!(!intron.present);
/// assert_eq!(intron.cpm, 0.0);
/// ```
pub fn compute_region_metrics(table: &GeneTable, region: Region, sample: Sample) -> RegionMetrics {
    let mut rows = table.region_rows(region).peekable();
    if rows.peek().is_none() {
        return RegionMetrics::absent();
    }

    let cpm = positive_mean(rows.flat_map(|row| row.cpks(sample)));

    let rate_of = |modification: Modification| {
        table
            .first(region, modification)
            .map(|row| {
                row.rate(sample).unwrap_or_else(|e| {
                    debug!(
                        "{} {} {}: using a rate of 0.0: {}",
                        region.label(),
                        modification.label(),
                        sample,
                        e
                    );
                    0.0
                })
            })
            .unwrap_or(0.0)
    };

    let unmod_rate = rate_of(Modification::Unmod);
    let m6a_rate = rate_of(Modification::M6a);
    let ai_rate = rate_of(Modification::Inosine);

    RegionMetrics {
        present: true,
        cpm,
        ai_rate,
        m6a_rate,
        unmod_rate,
        either_rate: either_rate(ai_rate, m6a_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::rate_parser::RateCell;
    use crate::table::{Measurement, RawMeasurementRow};
    use assert_approx_eq::assert_approx_eq;

    fn row(
        feature: Region,
        modification: Modification,
        cpk: [Option<f64>; 2],
        rate: [&str; 2],
    ) -> RawMeasurementRow {
        let measurement = |i: usize| Measurement {
            cpk: cpk[i],
            count: None,
            rate: rate[i].parse::<RateCell>(),
        };
        RawMeasurementRow {
            feature,
            modification,
            replicates: [measurement(0), measurement(1)],
        }
    }

    #[test]
    fn test_azin1_utr5() {
        let table = GeneTable::new(
            vec![
                row(Region::Utr5, Modification::Inosine, [Some(12.0), Some(3.0)], ["0.050 ± 0.010", "0.1"]),
                row(Region::Utr5, Modification::M6a, [None, None], ["0.030 ± 0.005", "0.2"]),
                row(Region::Utr5, Modification::Unmod, [None, None], ["0.920 ± 0.011", "0.7"]),
            ],
            [true, true],
        );

        let metrics = compute_region_metrics(&table, Region::Utr5, Sample::Rep1);
        assert!(metrics.present);
        assert_eq!(metrics.cpm, 12.0);
        assert_eq!(metrics.ai_rate, 0.05);
        assert_eq!(metrics.m6a_rate, 0.03);
        assert_eq!(metrics.unmod_rate, 0.92);
        assert_approx_eq!(metrics.either_rate, 0.08);
        assert_eq!(metrics.cpm_value(), Some(12.0));
    }

    #[test]
    fn test_cpm_ignores_non_positive_values() {
        let table = GeneTable::new(
            vec![
                row(Region::Exon, Modification::Inosine, [Some(10.0), None], ["0.1", "0.1"]),
                row(Region::Exon, Modification::M6a, [Some(0.0), None], ["0.1", "0.1"]),
                row(Region::Exon, Modification::Unmod, [Some(20.0), None], ["0.8", "0.8"]),
                row(Region::Exon, Modification::Unmod, [Some(f64::NAN), None], ["0.8", "0.8"]),
            ],
            [true, true],
        );
        let metrics = compute_region_metrics(&table, Region::Exon, Sample::Rep1);
        assert_eq!(metrics.cpm, 15.0);

        // no positive CPK at all: present but zero
        let metrics = compute_region_metrics(&table, Region::Exon, Sample::Rep2);
        assert!(metrics.present);
        assert_eq!(metrics.cpm, 0.0);
        assert_eq!(metrics.cpm_value(), Some(0.0));
    }

    #[test]
    fn test_absent_region() {
        let table = GeneTable::new(
            vec![row(Region::Exon, Modification::M6a, [Some(5.0), Some(5.0)], ["0.4", "0.4"])],
            [true, true],
        );
        let metrics = compute_region_metrics(&table, Region::Utr3, Sample::Rep1);
        assert_eq!(metrics, RegionMetrics::absent());
        assert_eq!(metrics.cpm_value(), None);
        assert_eq!(metrics.rate(RateKind::Either), 0.0);
    }

    #[test]
    fn test_missing_modifications_default_to_zero() {
        let table = GeneTable::new(
            vec![row(Region::Intron, Modification::M6a, [Some(5.0), Some(5.0)], ["0.4", "garbage"])],
            [true, true],
        );
        let rep1 = compute_region_metrics(&table, Region::Intron, Sample::Rep1);
        assert_eq!(rep1.m6a_rate, 0.4);
        assert_eq!(rep1.ai_rate, 0.0);
        assert_eq!(rep1.unmod_rate, 0.0);
        assert_eq!(rep1.either_rate, 0.4);

        // unparseable cell
        let rep2 = compute_region_metrics(&table, Region::Intron, Sample::Rep2);
        assert_eq!(rep2.m6a_rate, 0.0);
        assert_eq!(rep2.cpm, 5.0);
    }

    #[test]
    fn test_first_row_wins() {
        let table = GeneTable::new(
            vec![
                row(Region::Exon, Modification::Inosine, [Some(1.0), None], ["0.2", "0.2"]),
                row(Region::Exon, Modification::Inosine, [Some(3.0), None], ["0.6", "0.6"]),
            ],
            [true, true],
        );
        let metrics = compute_region_metrics(&table, Region::Exon, Sample::Rep1);
        assert_eq!(metrics.ai_rate, 0.2);
        // CPM still uses every row of the region
        assert_eq!(metrics.cpm, 2.0);
    }

    #[test]
    fn test_pooled_metrics() {
        let table = GeneTable::new(
            vec![
                row(Region::Exon, Modification::Inosine, [Some(10.0), Some(30.0)], ["0.2", "0.4"]),
                row(Region::Exon, Modification::M6a, [Some(0.0), None], ["0.1", "bad"]),
            ],
            [true, true],
        );
        let metrics = compute_region_metrics(&table, Region::Exon, Sample::Pooled);
        assert_eq!(metrics.cpm, 20.0);
        assert_approx_eq!(metrics.ai_rate, 0.3);
        assert_eq!(metrics.m6a_rate, 0.0);
    }

    #[test]
    fn test_either_rate_is_capped() {
        for (ai, m6a) in [(0.0, 0.0), (0.3, 0.2), (0.7, 0.6), (1.0, 1.0), (0.5, 0.5)] {
            let either = either_rate(ai, m6a);
            assert!((0.0..=1.0).contains(&either));
            assert_eq!(either, (ai + m6a).min(1.0));
        }
        assert_eq!(either_rate(0.7, 0.6), 1.0);
    }

    #[test]
    fn test_positive_mean() {
        assert_eq!(positive_mean(vec![]), 0.0);
        assert_eq!(positive_mean(vec![0.0, -1.0]), 0.0);
        assert_eq!(positive_mean(vec![2.0, 0.0, 4.0]), 3.0);
        assert_eq!(positive_mean(vec![f64::NAN, 6.0]), 6.0);
    }
}
