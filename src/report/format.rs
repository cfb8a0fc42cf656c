//! Formatted terminal output.
//!
//! Formatting lives here so the detection and table code stays free of
//! presentation concerns, and output changes stay localized.

use crate::app::pipeline::SetupRun;
use crate::domain::{ParameterTable, RowIssue, SetupConfig, SkippedLine};

/// Run summary: inputs, detection results and the continuum.
pub fn format_setup_summary(run: &SetupRun, config: &SetupConfig) -> String {
    let result = &run.output;
    let mut out = String::new();

    out.push_str("=== spl - spectral line fit setup ===\n");
    out.push_str(&format!("Spectrum: {}\n", config.spectrum_path.display()));
    out.push_str(&format!("Catalog: {} ({} lines)\n", config.catalog_path.display(), run.catalog.len()));
    out.push_str(&format!(
        "Samples: read={} used={} | in range [{:.2}, {:.2}]: {}\n",
        run.ingest.rows_read,
        run.ingest.rows_used,
        config.wavelength_min,
        config.wavelength_max,
        result.spectrum.len()
    ));
    if !run.ingest.row_errors.is_empty() {
        out.push_str(&format!("Row errors: {} (see log)\n", run.ingest.row_errors.len()));
    }
    out.push_str(&format!(
        "Noise: std={:.4} | continuum samples={}\n",
        result.detection.noise_estimate,
        result.detection.mask.iter().filter(|&&m| m).count()
    ));

    out.push_str("\nDetected lines:\n");
    out.push_str(&format!(
        "{:<16} {:>10} {:>10} {:>8} {:>10} {:>8}\n",
        "line", "rest", "observed", "fwhm", "peak", "snr"
    ));
    for line in &result.detection.lines {
        let snr = result
            .filtered
            .iter()
            .find(|f| f.name == line.name)
            .map(|f| format!("{:.2}", f.snr))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<16} {:>10.3} {:>10.3} {:>8.3} {:>10.3} {:>8}\n",
            truncate(&line.name, 16),
            line.rest_wavelength,
            line.observed_wavelength,
            line.fwhm,
            line.peak_flux,
            snr
        ));
    }
    out.push_str(&format_skipped(&result.detection.skipped));

    match &result.continuum {
        Some(c) => out.push_str(&format!(
            "\nContinuum: amplitude={:.6} location={:.3} shape={:.6}\n",
            c.amplitude, c.location, c.shape
        )),
        None => out.push_str("\nContinuum: not fitted\n"),
    }

    out
}

fn format_skipped(skipped: &[SkippedLine]) -> String {
    let mut out = String::new();
    for s in skipped {
        out.push_str(&format!("  (skipped {}) {}\n", s.name, s.reason.label()));
    }
    out
}

/// One line per row: name, model, component, then `value [min, max]` per parameter.
pub fn format_table(table: &ParameterTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<16} {:<10} {:>4}  parameters\n", "line", "model", "comp"));
    out.push_str(&format!("{:-<16} {:-<10} {:->4}  {:-<10}\n", "", "", "", ""));
    for row in table.rows() {
        let params: Vec<String> = row
            .values()
            .iter()
            .zip(row.params().min())
            .zip(row.params().max())
            .map(|((v, lo), hi)| format!("{} [{}, {}]", fmt_num(*v), fmt_num(*lo), fmt_num(*hi)))
            .collect();
        out.push_str(&format!(
            "{:<16} {:<10} {:>4}  {}\n",
            truncate(row.line(), 16),
            row.kind().name(),
            row.component(),
            params.join("  ")
        ));
    }
    out
}

pub fn format_issues(issues: &[RowIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let mut out = String::from("Issues:\n");
    for issue in issues {
        let component = issue.component.map(|c| format!(" #{c}")).unwrap_or_default();
        out.push_str(&format!("- {}{component}: {}\n", issue.line, issue.error));
    }
    out
}

fn fmt_num(v: f64) -> String {
    if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{v:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
