//! Command-line parsing for `spl`.
//!
//! Argument parsing and command dispatch stay separate from the detection and
//! table code; `app` turns these structs into a `SetupConfig` and runs them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_SNR_WINDOW, DEFAULT_WINDOW_HALFWIDTH, ModelKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "spl", version, about = "Spectral line fit setup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect catalog lines in a spectrum and write an initial parameter table.
    Setup(SetupArgs),
    /// Add components to a (fitted) parameter table and recompute its bounds.
    Expand(ExpandArgs),
    /// Write the per-component results CSV for a fitted table.
    Export(ExportArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SetupArgs {
    /// Spectrum CSV (`wavelength, flux, flux_error`).
    #[arg(long, value_name = "CSV")]
    pub spectrum: PathBuf,

    /// Line catalog JSON.
    #[arg(long, value_name = "JSON")]
    pub catalog: PathBuf,

    /// Fitting range in wavelength units.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], required = true, allow_negative_numbers = true)]
    pub range: Vec<f64>,

    /// Initial power-law index of the continuum.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub gamma_init: f64,

    /// Half-width of the detection window around each rest wavelength.
    #[arg(long, default_value_t = DEFAULT_WINDOW_HALFWIDTH)]
    pub window: f64,

    /// Width of each side window used for the local SNR.
    #[arg(long, default_value_t = DEFAULT_SNR_WINDOW)]
    pub snr_window: f64,

    /// Seed for the noise that fills masked line regions.
    #[arg(long, env = "SPL_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Do not fit a continuum or add a continuum row.
    #[arg(long)]
    pub no_continuum: bool,

    /// Lower bounds for the continuum row (amplitude, location, index).
    #[arg(long, num_args = 3, value_names = ["AMP", "LOC", "INDEX"], allow_negative_numbers = true)]
    pub continuum_min: Option<Vec<f64>>,

    /// Upper bounds for the continuum row (amplitude, location, index).
    #[arg(long, num_args = 3, value_names = ["AMP", "LOC", "INDEX"], allow_negative_numbers = true)]
    pub continuum_max: Option<Vec<f64>>,

    /// Write the parameter table JSON here.
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ExpandArgs {
    /// Parameter table JSON.
    #[arg(long, value_name = "JSON")]
    pub table: PathBuf,

    /// Optimizer outcome JSON; its values replace the table's before expanding.
    #[arg(long, value_name = "JSON")]
    pub outcome: Option<PathBuf>,

    /// Component to add, as `LINE=MODEL` (repeatable).
    #[arg(long = "add", value_name = "LINE=MODEL", value_parser = parse_addition)]
    pub additions: Vec<(String, ModelKind)>,

    /// Write the expanded table JSON here.
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    /// Parameter table JSON the outcome was fitted with.
    #[arg(long, value_name = "JSON")]
    pub table: PathBuf,

    /// Optimizer outcome JSON (`values`, `errors`, `goodness`).
    #[arg(long, value_name = "JSON")]
    pub outcome: PathBuf,

    /// Results CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

/// Parse `LINE=MODEL`.
pub fn parse_addition(s: &str) -> Result<(String, ModelKind), String> {
    let (line, model) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LINE=MODEL, got `{s}`"))?;
    let line = line.trim();
    if line.is_empty() {
        return Err(format!("missing line name in `{s}`"));
    }
    let kind = model.parse::<ModelKind>().map_err(|e| e.to_string())?;
    Ok((line.to_string(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_setup_arguments() {
        let cli = Cli::parse_from([
            "spl", "setup", "--spectrum", "s.csv", "--catalog", "c.json", "--range", "4800", "5100", "--gamma-init",
            "-1.5", "--seed", "7",
        ]);
        let Command::Setup(args) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(args.range, vec![4800.0, 5100.0]);
        assert_eq!(args.gamma_init, -1.5);
        assert_eq!(args.seed, 7);
        assert_eq!(args.window, DEFAULT_WINDOW_HALFWIDTH);
        assert!(!args.no_continuum);
        assert_eq!(args.continuum_min, None);
    }

    #[test]
    fn parses_continuum_bounds() {
        let cli = Cli::parse_from([
            "spl", "setup", "--spectrum", "s.csv", "--catalog", "c.json", "--range", "4800", "5100", "--continuum-min",
            "0", "4000", "-5", "--continuum-max", "100", "6000", "5",
        ]);
        let Command::Setup(args) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(args.continuum_min, Some(vec![0.0, 4000.0, -5.0]));
        assert_eq!(args.continuum_max, Some(vec![100.0, 6000.0, 5.0]));
    }

    #[test]
    fn parses_repeated_additions() {
        let cli = Cli::parse_from([
            "spl", "expand", "--table", "t.json", "--add", "Ha=Lorentzian", "--add", "Ha=gaussian", "--add", "Hb=Voigt",
        ]);
        let Command::Expand(args) = cli.command else {
            panic!("expected expand");
        };
        assert_eq!(
            args.additions,
            vec![
                ("Ha".to_string(), ModelKind::Lorentzian),
                ("Ha".to_string(), ModelKind::Gaussian),
                ("Hb".to_string(), ModelKind::Voigt),
            ]
        );
    }

    #[test]
    fn rejects_malformed_additions() {
        assert!(parse_addition("Ha").is_err());
        assert!(parse_addition("=Gaussian").is_err());
        assert!(parse_addition("Ha=Sersic").unwrap_err().contains("Sersic"));
    }
}
