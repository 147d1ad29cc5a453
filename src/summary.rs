use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::dataset::{CategoryTable, DirSource, ObservationTable, TableSource};
use crate::pivot::{pivot_counts, PivotTable};
use crate::stats::{correlation_matrix, ClipBounds, WelfordStats};
use crate::types::{
    ColumnSummary, DashboardSummary, FileInfo, PivotSummary, Result, SummaryOptions,
};

/// Build the summary manifest for a dashboard data directory: file
/// provenance, per-column statistics with clip bounds, the correlation
/// matrix, and both filtered pivot tables.
pub fn build_summary(source: &DirSource, options: &SummaryOptions) -> Result<DashboardSummary> {
    let bundle = source.load()?;
    let mut warnings = Vec::new();

    let paths = [
        source.combined_path(),
        source.clean_path(),
        source.pollution_groups_path(),
        source.weather_groups_path(),
    ];
    let row_counts = [
        bundle.combined.len(),
        bundle.clean.len(),
        bundle.pollution_groups.len(),
        bundle.weather_groups.len(),
    ];
    let mut files = Vec::with_capacity(paths.len());
    for (path, row_count) in paths.iter().zip(row_counts) {
        files.push(file_info(path, row_count, options.hash_files)?);
    }

    if bundle.combined.is_empty() {
        warnings.push("Combined readings contain no rows".to_string());
    }
    if bundle.pollution_groups.is_empty() {
        warnings.push("Pollution groups contain no rows".to_string());
    }
    if bundle.weather_groups.is_empty() {
        warnings.push("Weather groups contain no rows".to_string());
    }

    let mut columns = Vec::new();
    for (name, column) in bundle.combined.numeric_columns() {
        let summary = column_summary(name, column);
        if summary.clip_lower.is_none() {
            warnings.push(format!(
                "Column '{name}' has no complete values; clip bounds unavailable"
            ));
        }
        columns.push(summary);
    }

    let correlation = clean_correlation(&bundle.clean);

    let pollution_pivot = pivot_summary(&bundle.pollution_groups, options.pivot_min_total);
    if pollution_pivot.columns.is_empty() {
        warnings.push(format!(
            "No pollution category combination reaches the {} count threshold",
            options.pivot_min_total
        ));
    }
    let weather_pivot = pivot_summary(&bundle.weather_groups, options.pivot_min_total);
    if weather_pivot.columns.is_empty() {
        warnings.push(format!(
            "No weather category combination reaches the {} count threshold",
            options.pivot_min_total
        ));
    }

    Ok(DashboardSummary {
        version: "1.0.0".to_string(),
        generated_at: Utc::now().to_rfc3339(),
        files,
        columns,
        correlation,
        pollution_pivot,
        weather_pivot,
        warnings,
        options: options.clone(),
    })
}

/// Summary statistics for one numeric column
pub fn column_summary(name: &str, column: &[Option<f64>]) -> ColumnSummary {
    let mut welford = WelfordStats::new();
    let mut missing = 0u64;
    for value in column {
        match value {
            Some(v) => welford.update(*v),
            None => missing += 1,
        }
    }
    let bounds = ClipBounds::from_column(column);

    ColumnSummary {
        name: name.to_string(),
        count: welford.count(),
        missing,
        mean: welford.mean(),
        std_dev: welford.std_dev(),
        min: welford.min(),
        max: welford.max(),
        clip_lower: bounds.map(|b| b.lower),
        clip_upper: bounds.map(|b| b.upper),
    }
}

/// Correlation matrix over all numeric fields of the clean readings
pub fn clean_correlation(clean: &ObservationTable) -> crate::stats::CorrelationMatrix {
    let columns: Vec<(&str, &[Option<f64>])> = clean.numeric_columns().collect();
    correlation_matrix(&columns)
}

fn pivot_summary(table: &CategoryTable, min_total: u64) -> PivotSummary {
    let pivot = pivot_counts(table).retain_frequent(min_total);
    let labels = (0..pivot.columns.len())
        .map(|c| pivot.column_label(c))
        .collect();
    let PivotTable {
        dimension_fields,
        index,
        values,
        ..
    } = pivot;
    PivotSummary {
        dimension_fields,
        index,
        columns: labels,
        values,
    }
}

fn file_info(path: &Path, row_count: usize, hash: bool) -> Result<FileInfo> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let sha256 = if hash {
        Some(file_sha256(path)?)
    } else {
        None
    };
    Ok(FileInfo {
        file_name,
        row_count,
        sha256,
    })
}

/// Streaming SHA-256 of a file
fn file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
