pub mod config;
pub mod error;
pub mod parsers;
pub mod quantification;
pub mod report;
pub mod table;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents a transcript region, as named in the `Feature` column of a
/// gene table.
///
/// The four regions are fixed, and every per-gene computation visits them in
/// the order given by [`Region::ALL`].
///
/// # Example
///
/// ```rust
/// use mod_rate::{Region, RegionKey};
///
/// assert_eq!(Region::from_label("UTR_5"), Some(Region::Utr5));
/// assert_eq!(Region::from_label("CDS"), None);
/// assert_eq!(Region::Intron.key(), RegionKey::Intron);
/// assert_eq!(Region::Utr3.key().prefix(), "utr3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Utr5,
    Utr3,
    Exon,
    Intron,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Utr5, Region::Utr3, Region::Exon, Region::Intron];

    /// Label used in the `Feature` column of the raw table.
    pub fn label(&self) -> &'static str {
        match self {
            Region::Utr5 => "UTR_5",
            Region::Utr3 => "UTR_3",
            Region::Exon => "Exon",
            Region::Intron => "Intron",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Region::ALL.into_iter().find(|region| region.label() == label)
    }

    /// Position of the region in [`Region::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn key(&self) -> RegionKey {
        match self {
            Region::Utr5 => RegionKey::Utr5,
            Region::Utr3 => RegionKey::Utr3,
            Region::Exon => RegionKey::Exon,
            Region::Intron => RegionKey::Intron,
        }
    }
}

/// Represents the modification state reported by a row of a gene table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modification {
    Unmod,
    M6a,
    Inosine,
}

impl Modification {
    pub const ALL: [Modification; 3] = [Modification::Unmod, Modification::M6a, Modification::Inosine];

    /// Label used in the `Modification` column of the raw table.
    pub fn label(&self) -> &'static str {
        match self {
            Modification::Unmod => "Unmod",
            Modification::M6a => "m6A",
            Modification::Inosine => "Inosine",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Modification::ALL
            .into_iter()
            .find(|modification| modification.label() == label)
    }
}

/// The modification rates that are totalled per gene and regressed against
/// expression. `Either` is derived from the other two, see
/// [`quantification::region_metrics::either_rate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Ai,
    M6a,
    Either,
}

impl RateKind {
    pub const ALL: [RateKind; 3] = [RateKind::Ai, RateKind::M6a, RateKind::Either];

    /// Short name used in column names, e.g. the `ai` in `utr5_ai_rate`.
    pub fn stem(&self) -> &'static str {
        match self {
            RateKind::Ai => "ai",
            RateKind::M6a => "m6a",
            RateKind::Either => "either",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RateKind::Ai => "A-to-I",
            RateKind::M6a => "m6A",
            RateKind::Either => "Either Modification",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Column prefix of a gene record: one of the four regions, or the gene-level
/// totals.
///
/// # Example
///
/// ```rust
/// use mod_rate::{RateKind, RegionKey};
///
/// assert_eq!(RegionKey::Total.cpm_column(), "total_cpm");
/// assert_eq!(RegionKey::Utr5.rate_column(RateKind::Either), "utr5_either_rate");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKey {
    Utr5,
    Utr3,
    Exon,
    Intron,
    Total,
}

impl RegionKey {
    pub const ALL: [RegionKey; 5] = [
        RegionKey::Utr5,
        RegionKey::Utr3,
        RegionKey::Exon,
        RegionKey::Intron,
        RegionKey::Total,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            RegionKey::Utr5 => "utr5",
            RegionKey::Utr3 => "utr3",
            RegionKey::Exon => "exon",
            RegionKey::Intron => "intron",
            RegionKey::Total => "total",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RegionKey::Utr5 => "5' UTR",
            RegionKey::Utr3 => "3' UTR",
            RegionKey::Exon => "Exonic",
            RegionKey::Intron => "Intronic",
            RegionKey::Total => "Total Gene",
        }
    }

    /// The region behind this key, `None` for the totals.
    pub fn region(&self) -> Option<Region> {
        match self {
            RegionKey::Utr5 => Some(Region::Utr5),
            RegionKey::Utr3 => Some(Region::Utr3),
            RegionKey::Exon => Some(Region::Exon),
            RegionKey::Intron => Some(Region::Intron),
            RegionKey::Total => None,
        }
    }

    pub fn cpm_column(&self) -> String {
        format!("{}_cpm", self.prefix())
    }

    pub fn rate_column(&self, kind: RateKind) -> String {
        format!("{}_{}_rate", self.prefix(), kind.stem())
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Which measurements of a gene table a computation reads.
///
/// `Rep1` and `Rep2` read a single replicate's columns. `Pooled` reads both:
/// CPK values from both replicates and the mean of the two replicate rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sample {
    Rep1,
    Rep2,
    Pooled,
}

impl Sample {
    pub const REPLICATES: [Sample; 2] = [Sample::Rep1, Sample::Rep2];

    /// Indices of the replicate columns this sample reads.
    pub fn replicate_indices(&self) -> &'static [usize] {
        match self {
            Sample::Rep1 => &[0],
            Sample::Rep2 => &[1],
            Sample::Pooled => &[0, 1],
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Rep1 => f.write_str("rep1"),
            Sample::Rep2 => f.write_str("rep2"),
            Sample::Pooled => f.write_str("pooled"),
        }
    }
}
