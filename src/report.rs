use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::info;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::SampleLabels;
use crate::error::ReportError;
use crate::quantification::dataset::SampleDataset;
use crate::quantification::gene_record::GeneRecord;
use crate::quantification::regression::{RegressionKey, RegressionResult};
use crate::table::GeneTable;
use crate::{RateKind, RegionKey, Sample};

/// Written in place of a chromosome, which gene tables do not record.
pub const PLACEHOLDER_CHROMOSOME: &str = "chrUn";

pub const REGRESSION_STATS_FILE: &str = "regression_stats.csv";
pub const COMBINED_JSON_FILE: &str = "gene_data_combined.json";

pub fn gene_csv_filename(label: &str) -> String {
    format!("gene_data_{}.csv", label)
}

pub fn gene_json_filename(label: &str) -> String {
    format!("gene_data_{}.json", label)
}

/// A gene object of the JSON export, keys in output order.
pub type GeneEntry = IndexMap<String, JsonValue>;

#[derive(Debug, Serialize)]
struct RawRowEntry {
    feature: &'static str,
    modification: &'static str,
    count: u64,
    cpk: f64,
    mr: f64,
}

/// A gene CSV field. Numbers go through the csv serializer, as regression
/// rows do, and `None` becomes an empty cell.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CsvCell<'a> {
    Text(&'a str),
    Number(Option<f64>),
}

#[derive(Debug, Serialize)]
struct RegressionRow<'a> {
    sample: &'a str,
    region: RegionKey,
    mod_type: RateKind,
    slope: f64,
    intercept: f64,
    r_squared: f64,
    p_value: f64,
    std_err: f64,
    n: usize,
}

fn create(path: &Path) -> Result<BufWriter<File>, ReportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes a dataset as CSV: `gene_name` followed by the flattened columns.
/// The CPM of a region the gene does not contain is an empty cell.
pub fn write_gene_csv(path: &Path, dataset: &SampleDataset) -> Result<(), ReportError> {
    let csv_error = |source: csv::Error| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(create(path)?);

    let mut header = vec!["gene_name".to_string()];
    header.extend(GeneRecord::column_names());
    writer.write_record(&header).map_err(csv_error)?;

    for record in &dataset.records {
        let mut cells = Vec::with_capacity(header.len());
        cells.push(CsvCell::Text(&record.gene_name));
        cells.extend(record.values().into_iter().map(CsvCell::Number));
        writer.serialize(&cells).map_err(csv_error)?;
    }

    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the JSON gene objects of a dataset.
///
/// Each object holds a 1-based `id`, the gene `name`, the placeholder
/// chromosome, every flattened column (missing values as 0) and, when the
/// gene's table is given, its rows as `raw_data`.
pub fn gene_entries(
    dataset: &SampleDataset,
    genes: &IndexMap<String, GeneTable>,
) -> Vec<GeneEntry> {
    dataset
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut entry = GeneEntry::new();
            entry.insert("id".to_string(), JsonValue::from(i + 1));
            entry.insert("name".to_string(), JsonValue::from(record.gene_name.clone()));
            entry.insert(
                "chromosome".to_string(),
                JsonValue::from(PLACEHOLDER_CHROMOSOME),
            );
            for (column, value) in record.columns() {
                entry.insert(column, JsonValue::from(value.unwrap_or(0.0)));
            }
            if let Some(table) = genes.get(&record.gene_name) {
                entry.insert(
                    "raw_data".to_string(),
                    raw_data(table, dataset.sample),
                );
            }
            entry
        })
        .collect()
}

fn raw_data(table: &GeneTable, sample: Sample) -> JsonValue {
    let rows: Vec<JsonValue> = table
        .rows()
        .iter()
        .map(|row| {
            let entry = RawRowEntry {
                feature: row.feature.label(),
                modification: row.modification.label(),
                count: row.count(sample).unwrap_or(0),
                cpk: row.cpk(sample).filter(|v| v.is_finite()).unwrap_or(0.0),
                mr: row.rate(sample).unwrap_or(0.0),
            };
            serde_json::to_value(entry).unwrap_or(JsonValue::Null)
        })
        .collect();
    JsonValue::Array(rows)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_gene_json(path: &Path, entries: &[GeneEntry]) -> Result<(), ReportError> {
    write_json(path, &entries)
}

/// Writes every sample's gene objects into one file, keyed by sample label.
pub fn write_combined_json(
    path: &Path,
    entries: &IndexMap<String, Vec<GeneEntry>>,
) -> Result<(), ReportError> {
    write_json(path, entries)
}

/// Writes the regression results, one row per key in key order.
pub fn write_regression_csv(
    path: &Path,
    results: &BTreeMap<RegressionKey, RegressionResult>,
    labels: &SampleLabels,
) -> Result<(), ReportError> {
    let csv_error = |source: csv::Error| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(create(path)?);

    for result in results.values() {
        writer
            .serialize(RegressionRow {
                sample: labels.label(result.sample),
                region: result.region,
                mod_type: result.modification,
                slope: result.slope,
                intercept: result.intercept,
                r_squared: result.r_squared,
                p_value: result.p_value,
                std_err: result.std_err,
                n: result.n,
            })
            .map_err(csv_error)?;
    }

    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every report into `output_dir` and returns the written paths.
pub fn write_all(
    output_dir: &Path,
    datasets: &[SampleDataset],
    genes: &IndexMap<String, GeneTable>,
    results: &BTreeMap<RegressionKey, RegressionResult>,
    labels: &SampleLabels,
) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(output_dir).map_err(|source| ReportError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    let mut combined: IndexMap<String, Vec<GeneEntry>> = IndexMap::new();

    for dataset in datasets {
        let label = labels.label(dataset.sample);

        let csv_path = output_dir.join(gene_csv_filename(label));
        write_gene_csv(&csv_path, dataset)?;
        info!("Exported {} gene data to {:?}", label, csv_path);
        written.push(csv_path);

        let entries = gene_entries(dataset, genes);
        let json_path = output_dir.join(gene_json_filename(label));
        write_gene_json(&json_path, &entries)?;
        info!("Exported {} genes ({}) to {:?}", entries.len(), label, json_path);
        written.push(json_path);

        combined.insert(label.to_string(), entries);
    }

    let combined_path = output_dir.join(COMBINED_JSON_FILE);
    write_combined_json(&combined_path, &combined)?;
    info!("Exported combined data to {:?}", combined_path);
    written.push(combined_path);

    let stats_path = output_dir.join(REGRESSION_STATS_FILE);
    write_regression_csv(&stats_path, results, labels)?;
    info!("Exported {} regressions to {:?}", results.len(), stats_path);
    written.push(stats_path);

    Ok(written)
}

/// One line of the regression summary, with readable region and rate names.
pub fn summary_line(result: &RegressionResult) -> String {
    format!(
        "{:10} | {:19} | R²={:.4} | p={:.2e} | slope={:.2} | n={:4}",
        result.region.display_name(),
        result.modification.display_name(),
        result.r_squared,
        result.p_value,
        result.slope,
        result.n
    )
}

/// Logs the regression results grouped by sample.
pub fn log_regression_summary(
    results: &BTreeMap<RegressionKey, RegressionResult>,
    samples: &[Sample],
    labels: &SampleLabels,
) {
    info!("Regression statistics summary:");
    for &sample in samples {
        info!("{}:", labels.label(sample));
        for result in results.values().filter(|r| r.sample == sample) {
            info!("  {}", summary_line(result));
        }
    }
}
