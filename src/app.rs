//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs setup / expansion / export
//! - prints reports and writes output files

use clap::Parser;
use log::info;

use crate::cli::{Command, ExpandArgs, ExportArgs, SetupArgs};
use crate::domain::{ModelKind, SetupConfig};
use crate::error::AppError;
use crate::io::{read_fit_outcome, read_table_json, write_results_csv, write_table_json};
use crate::table::CONTINUUM_FIT_BOUNDS;

pub mod pipeline;

/// Entry point for the `spl` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Setup(args) => handle_setup(args),
        Command::Expand(args) => handle_expand(args),
        Command::Export(args) => handle_export(args),
    }
}

fn handle_setup(args: SetupArgs) -> Result<(), AppError> {
    let config = setup_config_from_args(&args)?;
    let run = pipeline::run_setup(&config)?;

    println!("{}", crate::report::format_setup_summary(&run, &config));
    println!("{}", crate::report::format_table(&run.output.build.table));
    print!("{}", crate::report::format_issues(&run.output.build.issues));

    if let Some(path) = &config.out {
        write_table_json(path, &run.output.build.table)?;
        info!("wrote parameter table to {}", path.display());
    }
    Ok(())
}

fn handle_expand(args: ExpandArgs) -> Result<(), AppError> {
    let mut table = read_table_json(&args.table)?;
    if let Some(path) = &args.outcome {
        let outcome = read_fit_outcome(path)?;
        table = table.with_values(&outcome.values)?;
    }

    let additions = group_additions(&args.additions);
    let expansion = crate::table::expand(&table, &additions);

    println!("{}", crate::report::format_table(&expansion.table));
    print!("{}", crate::report::format_issues(&expansion.issues));

    if let Some(path) = &args.out {
        write_table_json(path, &expansion.table)?;
        info!("wrote expanded table to {}", path.display());
    }
    Ok(())
}

fn handle_export(args: ExportArgs) -> Result<(), AppError> {
    let table = read_table_json(&args.table)?;
    let outcome = read_fit_outcome(&args.outcome)?;
    write_results_csv(&args.out, &table, &outcome)?;
    info!("wrote results to {}", args.out.display());
    Ok(())
}

pub fn setup_config_from_args(args: &SetupArgs) -> Result<SetupConfig, AppError> {
    let [wavelength_min, wavelength_max] = args.range[..] else {
        return Err(AppError::new(2, "`--range` takes exactly two values: MIN MAX."));
    };
    if !(wavelength_min < wavelength_max) {
        return Err(AppError::new(
            2,
            format!("Invalid range: {wavelength_min} must be below {wavelength_max}."),
        ));
    }
    Ok(SetupConfig {
        spectrum_path: args.spectrum.clone(),
        catalog_path: args.catalog.clone(),
        wavelength_min,
        wavelength_max,
        gamma_init: args.gamma_init,
        window_halfwidth: args.window,
        snr_window: args.snr_window,
        seed: args.seed,
        fit_continuum: !args.no_continuum,
        continuum_bounds: continuum_bounds_from_args(args)?,
        out: args.out.clone(),
    })
}

/// Caller-supplied continuum box; missing sides fall back to `CONTINUUM_FIT_BOUNDS`.
fn continuum_bounds_from_args(args: &SetupArgs) -> Result<([f64; 3], [f64; 3]), AppError> {
    let (default_min, default_max) = CONTINUUM_FIT_BOUNDS;
    let side = |values: &Option<Vec<f64>>, default: [f64; 3], flag: &str| -> Result<[f64; 3], AppError> {
        match values {
            None => Ok(default),
            Some(v) => <[f64; 3]>::try_from(v.as_slice())
                .map_err(|_| AppError::new(2, format!("`{flag}` takes exactly three values: AMP LOC INDEX."))),
        }
    };
    let min = side(&args.continuum_min, default_min, "--continuum-min")?;
    let max = side(&args.continuum_max, default_max, "--continuum-max")?;
    if let Some(i) = (0..3).find(|&i| !(min[i] <= max[i])) {
        return Err(AppError::new(
            2,
            format!("Invalid continuum bounds: min {} exceeds max {} at position {i}.", min[i], max[i]),
        ));
    }
    Ok((min, max))
}

/// Group `LINE=MODEL` pairs by line, keeping first-seen line order and the
/// order of models within each line.
pub fn group_additions(pairs: &[(String, ModelKind)]) -> Vec<(String, Vec<ModelKind>)> {
    let mut grouped: Vec<(String, Vec<ModelKind>)> = Vec::new();
    for (line, kind) in pairs {
        match grouped.iter_mut().find(|(l, _)| l == line) {
            Some((_, kinds)) => kinds.push(*kind),
            None => grouped.push((line.clone(), vec![*kind])),
        }
    }
    grouped
}
