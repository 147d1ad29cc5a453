use serde::{Deserialize, Serialize};

use crate::stats::CorrelationMatrix;

/// Numeric pollutant fields expected in the combined readings
pub const POLLUTANT_FIELDS: &[&str] = &["PM2.5", "PM10", "SO2", "NO2", "CO", "O3"];

/// Numeric weather fields expected in the combined readings
pub const WEATHER_FIELDS: &[&str] = &["TEMP", "PRES", "DEWP", "RAIN", "WSPM"];

/// Category dimensions of the pollution pivot source
pub const POLLUTION_CATEGORY_FIELDS: &[&str] = &[
    "PM25_Category",
    "PM10_Category",
    "SO2_Category",
    "NO2_Category",
    "CO_Category",
    "O3_Category",
];

/// Category dimensions of the weather pivot source
pub const WEATHER_CATEGORY_FIELDS: &[&str] = &[
    "TEMP_Category",
    "PRES_Category",
    "DEWP_Category",
    "WSPM_Category",
];

/// Station identifier column
pub const STATION_FIELD: &str = "station";

/// Wind direction column, forward-filled during wrangling
pub const WIND_DIRECTION_FIELD: &str = "wd";

/// Count column of the pivot source tables
pub const COUNT_FIELD: &str = "Count";

/// Minimum summed count for a pivot column to be kept
pub const DEFAULT_PIVOT_MIN_TOTAL: u64 = 2500;

/// Summary statistics for one numeric column of the combined readings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,

    /// Count of non-missing values
    pub count: u64,

    /// Count of missing values
    pub missing: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Lower winsorization bound; absent when the column has no complete values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_lower: Option<f64>,

    /// Upper winsorization bound; absent when the column has no complete values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_upper: Option<f64>,
}

/// Provenance of one input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    pub row_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Export form of a filtered pivot table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotSummary {
    /// Dimension field names the column tuples are drawn from
    pub dimension_fields: Vec<String>,

    /// Station rows, sorted
    pub index: Vec<String>,

    /// Joined label tuples ("High-Low-Normal-..."), filter order preserved
    pub columns: Vec<String>,

    /// values[row][column]
    pub values: Vec<Vec<u64>>,
}

/// Complete summary manifest for a dashboard data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Manifest version
    pub version: String,

    /// RFC 3339 generation timestamp
    pub generated_at: String,

    /// Provenance of the four input files
    pub files: Vec<FileInfo>,

    /// Per-column summaries of the combined readings
    pub columns: Vec<ColumnSummary>,

    /// Correlation over the clean readings
    pub correlation: CorrelationMatrix,

    pub pollution_pivot: PivotSummary,

    pub weather_pivot: PivotSummary,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Processing options used
    pub options: SummaryOptions,
}

/// Processing options for the summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Minimum summed count for a pivot column to be kept
    pub pivot_min_total: u64,

    /// Whether to hash the input files
    pub hash_files: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            pivot_min_total: DEFAULT_PIVOT_MIN_TOTAL,
            hash_files: true,
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
