//! Aggregation from raw gene tables to per-sample datasets, and the
//! rate-versus-CPM regressions over them.
//!
//! ```text
//!  GeneTable ── region_metrics ──> RegionMetrics (x4)
//!                                      │
//!                gene_record ──────────┘──> GeneRecord
//!                                              │
//!                    dataset ──────────────────┘──> SampleDataset
//!                                                      │
//!                 regression ──────────────────────────┘──> RegressionResult
//! ```

pub mod dataset;
pub mod gene_record;
pub mod region_metrics;
pub mod regression;
