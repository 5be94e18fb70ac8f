//! FILENAME: cli/src/main.rs
//! PURPOSE: `tab2pbi`: converts Tableau workbooks and data sources into
//! Power BI artifacts from the command line.
//! CONTEXT: Thin wrapper over `engine::MigrationEngine`. Inputs may be files
//! or directories; directories are scanned for supported files.

mod logging;

use clap::Parser;
use engine::{FormulaSettings, MigrationEngine, MigrationSettings, PipelineResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "tab2pbi")]
#[command(about = "Convert Tableau workbooks (.twb, .twbx, .tds, .tdsx) to Power BI artifacts")]
#[command(version)]
struct Cli {
    /// Files or directories to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Directory holding the mapping documents (built-in defaults when omitted)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Where converted artifacts are written
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output name for a single file input (defaults to the file stem)
    #[arg(long)]
    name: Option<String>,

    /// Table that qualifies bare field references in DAX
    #[arg(long, default_value = "Sales")]
    table: String,

    /// Column used as the ordering placeholder in table calculations
    #[arg(long, default_value = "OrderDate")]
    order_column: String,

    /// Also write every log line to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Save the session report (JSON) to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print each pipeline result as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match logging::parse_level(&cli.verbosity) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = logging::init(level, cli.log_file.as_deref()) {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn settings_of(cli: &Cli) -> MigrationSettings {
    MigrationSettings {
        config_dir: cli.config_dir.clone(),
        output_dir: cli.output_dir.clone(),
        formula: FormulaSettings {
            table: cli.table.clone(),
            order_column: cli.order_column.clone(),
        },
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let mut engine = MigrationEngine::new(settings_of(&cli)).map_err(|e| e.to_string())?;
    let started = chrono::Local::now();

    if cli.name.is_some() && (cli.inputs.len() != 1 || cli.inputs[0].is_dir()) {
        return Err("--name needs exactly one file input".to_string());
    }

    let mut results = Vec::new();
    for input in &cli.inputs {
        if input.is_dir() {
            let found = engine
                .convert_directory(input, cli.recursive)
                .map_err(|e| e.to_string())?;
            results.extend(found.into_iter().map(|r| (file_of(&r, input), r)));
        } else {
            let result = engine.convert_file(input, cli.name.as_deref());
            results.push((input.clone(), result));
        }
    }

    for (path, result) in &results {
        if cli.json {
            let line = serde_json::to_string(result).map_err(|e| e.to_string())?;
            println!("{}", line);
        } else {
            print_result(path, result);
        }
    }

    let stats = engine.stats();
    let elapsed = chrono::Local::now() - started;
    if !cli.json {
        println!(
            "Processed {} file(s): {} succeeded, {} failed, {} warning(s) in {} ms",
            stats.files_processed,
            stats.successful_conversions,
            stats.failed_conversions,
            stats.warnings_generated,
            elapsed.num_milliseconds()
        );
    }

    if let Some(report) = cli.report.as_deref() {
        let saved = engine
            .save_session_report(Some(report))
            .map_err(|e| e.to_string())?;
        log::info!("Session report saved to {}", saved.display());
    }

    if results.is_empty() {
        log::warn!("No Tableau files found");
    }
    Ok(if stats.failed_conversions == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Source file recorded in the result metadata, else the input itself.
fn file_of(result: &PipelineResult, fallback: &Path) -> PathBuf {
    result
        .metadata
        .get("file_path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.to_path_buf())
}

fn print_result(path: &Path, result: &PipelineResult) {
    if result.success {
        let outputs = result
            .metadata
            .get("output_files")
            .and_then(|v| v.as_array())
            .map_or(0, |files| files.len());
        println!("OK    {} ({} files written)", path.display(), outputs);
    } else {
        println!("FAIL  {}", path.display());
        println!("      {}", result.error_summary());
    }
    for warning in &result.warnings {
        println!("      warning: {}", warning.message);
    }
}
