use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// IQR multiplier for outlier clipping
pub const IQR_CUTOFF_FACTOR: f64 = 1.5;

/// Welford's online algorithm for computing mean and variance in O(1) memory
#[derive(Debug, Clone)]
pub struct WelfordStats {
    count: u64,
    mean: f64,
    m2: f64, // Sum of squares of differences from current mean
    min: Option<f64>,
    max: Option<f64>,
}

impl WelfordStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: None,
            max: None,
        }
    }

    /// Add a new value to the running statistics
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.mean)
        } else {
            None
        }
    }

    pub fn variance(&self) -> Option<f64> {
        if self.count > 1 {
            Some(self.m2 / (self.count - 1) as f64)
        } else {
            None
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(|v| v.sqrt())
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

impl Default for WelfordStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the non-missing values of a column
pub fn column_mean(column: &[Option<f64>]) -> Option<f64> {
    let mut stats = WelfordStats::new();
    for v in column.iter().flatten() {
        stats.update(*v);
    }
    stats.mean()
}

/// Linear-interpolation quantile of an ascending-sorted, non-empty slice.
/// `h = (n - 1) * p`, interpolated between the surrounding order statistics.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&p));

    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
    }
}

fn sorted_complete(column: &[Option<f64>]) -> Vec<f64> {
    let mut complete: Vec<f64> = column.iter().flatten().copied().collect();
    complete.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    complete
}

/// Quartile-derived clipping bounds for IQR winsorization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ClipBounds {
    /// Compute bounds from the non-missing values of a column.
    /// None signals insufficient data (no complete values).
    pub fn from_column(column: &[Option<f64>]) -> Option<Self> {
        let complete = sorted_complete(column);
        if complete.is_empty() {
            return None;
        }

        let q1 = quantile_sorted(&complete, 0.25);
        let q3 = quantile_sorted(&complete, 0.75);
        let cutoff = IQR_CUTOFF_FACTOR * (q3 - q1);
        Some(Self {
            q1,
            q3,
            lower: q1 - cutoff,
            upper: q3 + cutoff,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Clip a value into [lower, upper]
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower
        } else if value > self.upper {
            self.upper
        } else {
            value
        }
    }
}

/// Winsorized copy of a column. `bounds` is None when the column had no
/// complete values; the values then pass through unchanged.
#[derive(Debug, Clone)]
pub struct Winsorized {
    pub values: Vec<Option<f64>>,
    pub bounds: Option<ClipBounds>,
}

/// Clip a column's extreme values to its IQR-derived bounds. Missing entries
/// pass through unchanged, as does everything inside the bounds.
pub fn winsorize(column: &[Option<f64>]) -> Winsorized {
    match ClipBounds::from_column(column) {
        Some(bounds) => Winsorized {
            values: column.iter().map(|v| v.map(|x| bounds.clamp(x))).collect(),
            bounds: Some(bounds),
        },
        None => Winsorized {
            values: column.to_vec(),
            bounds: None,
        },
    }
}

/// Five-number summary used for box plots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiveNumber {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumber {
    /// Compute from the non-missing values of a column.
    /// None when the column has no complete values.
    pub fn from_column(column: &[Option<f64>]) -> Option<Self> {
        let complete = sorted_complete(column);
        let (first, last) = (complete.first()?, complete.last()?);
        Some(Self {
            min: *first,
            q1: quantile_sorted(&complete, 0.25),
            median: quantile_sorted(&complete, 0.5),
            q3: quantile_sorted(&complete, 0.75),
            max: *last,
        })
    }
}

/// Forward-fill missing entries from the most recent present value.
/// Leading missing entries stay missing.
pub fn forward_fill<T: Clone>(column: &[Option<T>]) -> Vec<Option<T>> {
    let mut last: Option<T> = None;
    column
        .iter()
        .map(|v| {
            if let Some(v) = v {
                last = Some(v.clone());
            }
            last.clone()
        })
        .collect()
}

/// Pairwise-complete Pearson correlation between two columns of equal length.
/// None when fewer than two complete pairs exist or either side is constant.
pub fn correlation(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some((*x, *y)),
            _ => None,
        })
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for &(x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

/// Symmetric Pearson correlation matrix over named columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<String>,
    /// values[i][j]; None where the correlation is undefined
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compute the correlation matrix of the given (name, column) pairs.
/// Each cell is computed pairwise-complete; the matrix is symmetric.
pub fn correlation_matrix(columns: &[(&str, &[Option<f64>])]) -> CorrelationMatrix {
    let fields = columns.iter().map(|(name, _)| name.to_string()).collect();
    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = correlation(columns[i].1, columns[j].1);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix { fields, values }
}
