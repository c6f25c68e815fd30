use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::{Map, Value as JsonValue};

use crate::config::SampleLabels;
use crate::error::{RateParseError, TableError};
use crate::parsers::rate_parser::RateCell;
use crate::table::{GeneTable, Measurement, RawMeasurementRow};
use crate::{Modification, Region};

pub const FEATURE_COLUMN: &str = "Feature";
pub const MODIFICATION_COLUMN: &str = "Modification";

enum TableFormat {
    Delimited(u8),
    Json,
}

impl TableFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "tsv" | "txt" => Some(TableFormat::Delimited(b'\t')),
            "csv" => Some(TableFormat::Delimited(b',')),
            "json" => Some(TableFormat::Json),
            _ => None,
        }
    }
}

/// Gene name of a table file: its file stem.
pub fn gene_name_from_path(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

/// Reads a single gene table, choosing the format by file extension.
///
/// Text tables need a header with `Feature` and `Modification` columns. A
/// replicate labelled `L` is read from `CPK_L`, `Count_L` and `L`; a table
/// may carry one, both or neither replicate, but never only part of one.
pub fn load_gene_table<P: AsRef<Path>>(
    path: P,
    labels: &SampleLabels,
) -> Result<GeneTable, TableError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)
        .ok_or_else(|| TableError::UnsupportedExtension(path.to_path_buf()))?;
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match format {
        TableFormat::Delimited(delimiter) => parse_delimited(reader, delimiter, labels, path),
        TableFormat::Json => parse_json(reader, labels, path),
    }
}

/// Loads every gene table of a directory, keyed by gene name in sorted path
/// order. Tables that fail to load are logged and skipped.
pub fn load_database<P: AsRef<Path>>(
    dir: P,
    labels: &SampleLabels,
) -> Result<IndexMap<String, GeneTable>, TableError> {
    let dir = dir.as_ref();
    let io_error = |source: io::Error| TableError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if !path.is_file() {
            continue;
        }
        if TableFormat::from_path(&path).is_some() {
            paths.push(path);
        } else {
            debug!("Ignoring {:?}: not a gene table", path);
        }
    }
    paths.sort();
    info!("Found {} gene tables in {:?}", paths.len(), dir);

    let mut genes = IndexMap::with_capacity(paths.len());
    for path in paths {
        let Some(gene) = gene_name_from_path(&path) else {
            continue;
        };
        if genes.contains_key(&gene) {
            warn!("Skipping {:?}: gene {} was already loaded", path, gene);
            continue;
        }
        match load_gene_table(&path, labels) {
            Ok(table) => {
                debug!("Loaded {} rows for {}", table.len(), gene);
                genes.insert(gene, table);
            }
            Err(e) => warn!("Error loading {}: {}", gene, e),
        }
    }

    info!("Successfully loaded {} genes", genes.len());
    Ok(genes)
}

/// Column positions of one replicate in a text table.
struct ReplicateColumns {
    cpk: usize,
    count: usize,
    rate: usize,
}

impl ReplicateColumns {
    fn locate(
        headers: &csv::StringRecord,
        labels: &SampleLabels,
        index: usize,
        path: &Path,
    ) -> Result<Option<Self>, TableError> {
        let names = [
            labels.cpk_column(index),
            labels.count_column(index),
            labels.rate_column(index),
        ];
        let found = names
            .clone()
            .map(|name| headers.iter().position(|h| h == name));

        match found {
            [Some(cpk), Some(count), Some(rate)] => Ok(Some(Self { cpk, count, rate })),
            [None, None, None] => Ok(None),
            _ => {
                let (name, _) = names
                    .into_iter()
                    .zip(found)
                    .find(|(_, position)| position.is_none())
                    .unwrap_or_default();
                Err(TableError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name,
                })
            }
        }
    }

    fn measurement(
        &self,
        record: &csv::StringRecord,
        path: &Path,
        row: usize,
    ) -> Result<Measurement, TableError> {
        let field = |i: usize| record.get(i).unwrap_or("");
        let invalid = |message: String| TableError::InvalidRow {
            path: path.to_path_buf(),
            row,
            message,
        };

        Ok(Measurement {
            cpk: parse_cpk(field(self.cpk)).map_err(invalid)?,
            count: parse_count(field(self.count)).map_err(invalid)?,
            rate: field(self.rate).parse(),
        })
    }
}

/// Parses a delimited gene table. `path` is only used in error messages.
pub fn parse_delimited<R: io::Read>(
    reader: R,
    delimiter: u8,
    labels: &SampleLabels,
    path: &Path,
) -> Result<GeneTable, TableError> {
    let csv_error = |source: csv::Error| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let required = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TableError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let feature_idx = required(FEATURE_COLUMN)?;
    let modification_idx = required(MODIFICATION_COLUMN)?;
    let replicate_columns = [
        ReplicateColumns::locate(&headers, labels, 0, path)?,
        ReplicateColumns::locate(&headers, labels, 1, path)?,
    ];

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        // header is line 1
        let line = i + 2;

        let feature = record.get(feature_idx).unwrap_or("");
        let modification = record.get(modification_idx).unwrap_or("");
        let Some((feature, modification)) = classify(feature, modification, path, line) else {
            continue;
        };

        let mut replicates = [Measurement::missing(), Measurement::missing()];
        for (slot, columns) in replicates.iter_mut().zip(&replicate_columns) {
            if let Some(columns) = columns {
                *slot = columns.measurement(&record, path, line)?;
            }
        }

        rows.push(RawMeasurementRow {
            feature,
            modification,
            replicates,
        });
    }

    let present = [replicate_columns[0].is_some(), replicate_columns[1].is_some()];
    Ok(GeneTable::new(rows, present))
}

/// Parses a JSON gene table: an array of row objects using the same keys as
/// the text headers. Rate cells may be numbers or `"mean ± std"` strings.
pub fn parse_json<R: io::Read>(
    reader: R,
    labels: &SampleLabels,
    path: &Path,
) -> Result<GeneTable, TableError> {
    let objects: Vec<Map<String, JsonValue>> =
        serde_json::from_reader(reader).map_err(|source| TableError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let present = [0, 1].map(|index| {
        let key = labels.rate_column(index);
        objects.iter().any(|object| object.contains_key(&key))
    });

    let mut rows = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        let row = i + 1;
        let text = |key: &str| object.get(key).and_then(JsonValue::as_str).unwrap_or("");
        let Some((feature, modification)) =
            classify(text(FEATURE_COLUMN), text(MODIFICATION_COLUMN), path, row)
        else {
            continue;
        };

        let mut replicates = [Measurement::missing(), Measurement::missing()];
        for (index, slot) in replicates.iter_mut().enumerate() {
            if present[index] {
                *slot = json_measurement(object, labels, index).map_err(|message| {
                    TableError::InvalidRow {
                        path: path.to_path_buf(),
                        row,
                        message,
                    }
                })?;
            }
        }

        rows.push(RawMeasurementRow {
            feature,
            modification,
            replicates,
        });
    }

    Ok(GeneTable::new(rows, present))
}

fn json_measurement(
    object: &Map<String, JsonValue>,
    labels: &SampleLabels,
    index: usize,
) -> Result<Measurement, String> {
    let cpk = match object.get(&labels.cpk_column(index)) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => parse_cpk(s)?,
        Some(other) => return Err(format!("invalid CPK value: {}", other)),
    };
    let count = match object.get(&labels.count_column(index)) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::Number(n)) => parse_count(&n.to_string())?,
        Some(JsonValue::String(s)) => parse_count(s)?,
        Some(other) => return Err(format!("invalid count value: {}", other)),
    };
    let rate = object
        .get(&labels.rate_column(index))
        .map(RateCell::from_json)
        .unwrap_or(Err(RateParseError::Empty));

    Ok(Measurement { cpk, count, rate })
}

fn classify(
    feature: &str,
    modification: &str,
    path: &Path,
    row: usize,
) -> Option<(Region, Modification)> {
    let Some(region) = Region::from_label(feature) else {
        debug!("{:?}: row {}: skipping feature '{}'", path, row, feature);
        return None;
    };
    let Some(modification) = Modification::from_label(modification) else {
        debug!("{:?}: row {}: skipping modification '{}'", path, row, modification);
        return None;
    };
    Some((region, modification))
}

/// Empty cells are missing. Anything else must be a number; NaN is kept and
/// later ignored by the positive-CPK filter.
fn parse_cpk(field: &str) -> Result<Option<f64>, String> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("invalid CPK value: '{}'", field))
}

/// Counts may be written as floats (`12.0`) by upstream tools.
fn parse_count(field: &str) -> Result<Option<u64>, String> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    if let Ok(count) = field.parse::<u64>() {
        return Ok(Some(count));
    }
    match field.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 => {
            Ok(Some(value as u64))
        }
        _ => Err(format!("invalid count value: '{}'", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;

    const HEADER: &str = "Feature\tModification\tCPK_MR01_1\tCount_MR01_1\tMR01_1\tCPK_MR01_2\tCount_MR01_2\tMR01_2";

    fn parse_tsv(text: &str) -> Result<GeneTable, TableError> {
        parse_delimited(
            text.as_bytes(),
            b'\t',
            &SampleLabels::default(),
            Path::new("inline.tsv"),
        )
    }

    #[test]
    fn test_parse_delimited_two_replicates() {
        let text = format!(
            "{HEADER}\nUTR_5\tInosine\t12.0\t3\t0.050 ± 0.010\t8.5\t2\t0.040 ± 0.020\nUTR_5\tm6A\t\t\t0.030 ± 0.005\t0\t0\tbad\n"
        );
        let table = parse_tsv(&text).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_sample(Sample::Pooled));

        let inosine = table.first(Region::Utr5, Modification::Inosine).unwrap();
        assert_eq!(inosine.replicates[0].cpk, Some(12.0));
        assert_eq!(inosine.replicates[0].count, Some(3));
        assert_eq!(inosine.rate(Sample::Rep1), Ok(0.05));
        assert_eq!(inosine.rate(Sample::Rep2), Ok(0.04));

        let m6a = table.first(Region::Utr5, Modification::M6a).unwrap();
        assert_eq!(m6a.replicates[0].cpk, None);
        assert_eq!(m6a.replicates[0].count, None);
        assert_eq!(m6a.replicates[1].cpk, Some(0.0));
        assert!(m6a.replicates[1].rate.is_err());
    }

    #[test]
    fn test_unknown_features_are_skipped() {
        let text = format!(
            "{HEADER}\nCDS\tInosine\t1\t1\t0.1\t1\t1\t0.1\nExon\tpseU\t1\t1\t0.1\t1\t1\t0.1\nExon\tUnmod\t1\t1\t0.9\t1\t1\t0.9\n"
        );
        let table = parse_tsv(&text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].feature, Region::Exon);
    }

    #[test]
    fn test_single_replicate_table() {
        let text = "Feature\tModification\tCPK_MR01_1\tCount_MR01_1\tMR01_1\nExon\tm6A\t5\t2\t0.2\n";
        let table = parse_tsv(text).unwrap();
        assert!(table.has_sample(Sample::Rep1));
        assert!(!table.has_sample(Sample::Rep2));
        assert!(table.rows()[0].replicates[1].rate.is_err());
    }

    #[test]
    fn test_partial_replicate_columns_are_an_error() {
        let text = "Feature\tModification\tCPK_MR01_1\tMR01_1\nExon\tm6A\t5\t0.2\n";
        let result = parse_tsv(text);
        assert!(matches!(
            result,
            Err(TableError::MissingColumn { column, .. }) if column == "Count_MR01_1"
        ));
    }

    #[test]
    fn test_missing_feature_column() {
        let text = "Modification\tCPK_MR01_1\tCount_MR01_1\tMR01_1\nm6A\t5\t2\t0.2\n";
        assert!(matches!(
            parse_tsv(text),
            Err(TableError::MissingColumn { column, .. }) if column == "Feature"
        ));
    }

    #[test]
    fn test_invalid_cpk_is_an_error() {
        let text = format!("{HEADER}\nExon\tm6A\tlots\t1\t0.1\t1\t1\t0.1\n");
        assert!(matches!(
            parse_tsv(&text),
            Err(TableError::InvalidRow { row: 2, .. })
        ));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12"), Ok(Some(12)));
        assert_eq!(parse_count("12.0"), Ok(Some(12)));
        assert_eq!(parse_count(""), Ok(None));
        assert_eq!(parse_count("nan"), Ok(None));
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("-3").is_err());
    }

    #[test]
    fn test_parse_json_numeric_and_string_rates() {
        let text = r#"[
            {"Feature": "Exon", "Modification": "Inosine", "CPK_MR01_1": 100.0, "Count_MR01_1": 7, "MR01_1": 0.1},
            {"Feature": "Exon", "Modification": "m6A", "CPK_MR01_1": null, "Count_MR01_1": 2.0, "MR01_1": "0.2 ± 0.05"},
            {"Feature": "Promoter", "Modification": "m6A", "CPK_MR01_1": 1.0, "Count_MR01_1": 1, "MR01_1": 0.9}
        ]"#;
        let table = parse_json(
            text.as_bytes(),
            &SampleLabels::default(),
            Path::new("inline.json"),
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_sample(Sample::Rep1));
        assert!(!table.has_sample(Sample::Rep2));

        let inosine = table.first(Region::Exon, Modification::Inosine).unwrap();
        assert_eq!(inosine.replicates[0].rate, Ok(RateCell::Numeric(0.1)));
        assert_eq!(inosine.replicates[0].count, Some(7));

        let m6a = table.first(Region::Exon, Modification::M6a).unwrap();
        assert_eq!(m6a.replicates[0].cpk, None);
        assert_eq!(m6a.replicates[0].count, Some(2));
        assert_eq!(m6a.rate(Sample::Rep1), Ok(0.2));
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        let result = parse_json(
            r#"{"Feature": "Exon"}"#.as_bytes(),
            &SampleLabels::default(),
            Path::new("inline.json"),
        );
        assert!(matches!(result, Err(TableError::Json { .. })));
    }

    #[test]
    fn test_gene_name_from_path() {
        assert_eq!(
            gene_name_from_path(Path::new("database/AZIN1.tsv")),
            Some("AZIN1".to_string())
        );
    }

    #[test]
    fn test_load_gene_table_unsupported_extension() {
        let result = load_gene_table("tests/data/database/AZIN1.pkl", &SampleLabels::default());
        assert!(matches!(result, Err(TableError::UnsupportedExtension(_))));
    }

    #[test]
    fn test_load_database() {
        let genes = load_database("tests/data/database", &SampleLabels::default()).unwrap();
        let names: Vec<&String> = genes.keys().collect();
        assert_eq!(names, vec!["ADAR", "AZIN1", "GRIA2", "METTL3", "SOLO1"]);
        assert_eq!(genes["AZIN1"].len(), 9);
    }
}
