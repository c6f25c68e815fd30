use std::collections::BTreeMap;

use log::{debug, info};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::RegressionError;
use crate::quantification::dataset::SampleDataset;
use crate::{RateKind, RegionKey, Sample};

/// Keeps the t statistic finite when |r| is 1.
const TINY: f64 = 1.0e-20;

/// Ordinary least-squares fit of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope against zero.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub n: usize,
}

/// Identifies one regression: a sample, a column prefix and a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegressionKey {
    pub sample: Sample,
    pub region: RegionKey,
    pub modification: RateKind,
}

/// Fit of modification rate (in percent) against CPM for one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    pub sample: Sample,
    pub region: RegionKey,
    pub modification: RateKind,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub std_err: f64,
    pub n: usize,
}

impl RegressionResult {
    pub fn new(key: RegressionKey, fit: LinearFit) -> Self {
        Self {
            sample: key.sample,
            region: key.region,
            modification: key.modification,
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            p_value: fit.p_value,
            std_err: fit.std_err,
            n: fit.n,
        }
    }

    pub fn key(&self) -> RegressionKey {
        RegressionKey {
            sample: self.sample,
            region: self.region,
            modification: self.modification,
        }
    }
}

/// Fits `y = slope * x + intercept` over the pairs where both values are
/// finite.
///
/// The p-value tests the slope against zero with a t-distribution on `n - 2`
/// degrees of freedom. With exactly two points the line is exact: the
/// standard error is 0 and the p-value is 0, or 1 when both `y` are equal.
///
/// # Example
///
/// ```rust
/// use mod_rate::quantification::regression::compute_regression;
///
/// let fit = compute_regression(&[10.0, 20.0], &[100.0, 50.0]).unwrap();
/// assert_eq!(fit.slope, -5.0);
/// assert_eq!(fit.intercept, 150.0);
/// assert_eq!(fit.r_squared, 1.0);
/// assert_eq!(fit.n, 2);
///
/// assert!(compute_regression(&[1.0, f64::NAN], &[2.0, 3.0]).is_err());
/// ```
pub fn compute_regression(x: &[f64], y: &[f64]) -> Result<LinearFit, RegressionError> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();

    let n = xs.len();
    if n < 2 {
        return Err(RegressionError::InsufficientData(n));
    }

    // compared before any sums: the mean of equal values can round off them
    if xs.iter().all(|&v| v == xs[0]) {
        return Err(RegressionError::ConstantPredictor);
    }

    let nf = n as f64;
    let x_mean = xs.iter().sum::<f64>() / nf;
    let y_mean = ys.iter().sum::<f64>() / nf;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (xi, yi) in xs.iter().zip(&ys) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        return Err(RegressionError::ConstantPredictor);
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let (p_value, std_err) = if n == 2 {
        let p_value = if ys[0] == ys[1] { 1.0 } else { 0.0 };
        (p_value, 0.0)
    } else {
        let df = nf - 2.0;
        let t = r * (df / ((1.0 - r + TINY) * (1.0 + r + TINY))).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| RegressionError::Distribution(df))?;
        let p_value = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);
        let std_err = ((1.0 - r * r) * syy / sxx / df).sqrt();
        (p_value, std_err)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared: r * r,
        p_value,
        std_err,
        n,
    })
}

/// Runs every (region, rate) regression of one dataset.
///
/// Keys whose columns the dataset lacks, and keys without a usable fit, are
/// left out of the result.
pub fn regress_dataset(
    dataset: &SampleDataset,
    rate_scale: f64,
) -> BTreeMap<RegressionKey, RegressionResult> {
    let mut results = BTreeMap::new();

    for region in RegionKey::ALL {
        for modification in RateKind::ALL {
            let key = RegressionKey {
                sample: dataset.sample,
                region,
                modification,
            };
            if !dataset.has_rate_column(region, modification) || !dataset.has_cpm_column(region) {
                debug!(
                    "Skipping {} {}_{}: missing columns",
                    key.sample, region, modification
                );
                continue;
            }

            let (x, y) = dataset.rate_cpm_pairs(region, modification, rate_scale);
            match compute_regression(&x, &y) {
                Ok(fit) => {
                    info!(
                        "Fitted {} {}_{} (R²={:.4}, n={})",
                        key.sample, region, modification, fit.r_squared, fit.n
                    );
                    results.insert(key, RegressionResult::new(key, fit));
                }
                Err(e) => info!("Skipping {} {}_{}: {}", key.sample, region, modification, e),
            }
        }
    }

    results
}

/// Runs the regressions of every dataset. Each dataset must be complete,
/// since every fit spans all of its genes.
pub fn regress_all(
    datasets: &[SampleDataset],
    rate_scale: f64,
) -> BTreeMap<RegressionKey, RegressionResult> {
    let mut results = BTreeMap::new();
    for dataset in datasets {
        results.extend(regress_dataset(dataset, rate_scale));
    }
    info!("Completed {} regressions", results.len());
    results
}
