use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use lb_report::{inspect_file, run_report, ChartFormat, ReportConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load-balancer simulation report CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the queue-size and requests-handled charts from a results CSV
    Render(RenderArgs),
    /// Report how a results CSV splits into time-series and summary sections
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Results CSV (defaults to simulation_results.csv)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Directory the charts are written to
    #[arg(short = 'd', long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Write charts without opening a viewer
    #[arg(long, action = ArgAction::SetTrue)]
    headless: bool,

    /// TOML config file (defaults to ./lb_report.toml when present)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Chart image format
    #[arg(long, value_enum)]
    format: Option<FormatOpt>,

    /// Chart width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Chart height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Fail when a time-series row follows the summary block
    #[arg(long, action = ArgAction::SetTrue)]
    strict_order: bool,

    /// Viewer command used to display charts (chart path is appended)
    #[arg(long)]
    viewer: Option<String>,

    /// Also write the parsed sections as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    datasets_json: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Results CSV (defaults to simulation_results.csv)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// TOML config file (defaults to ./lb_report.toml when present)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatOpt {
    Png,
    Svg,
}

impl From<FormatOpt> for ChartFormat {
    fn from(value: FormatOpt) -> Self {
        match value {
            FormatOpt::Png => ChartFormat::Png,
            FormatOpt::Svg => ChartFormat::Svg,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Render(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Render(args) => handle_render(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(format) = args.format {
        config.format = format.into();
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(viewer) = args.viewer {
        config.viewer = Some(viewer);
    }
    config.headless |= args.headless;
    config.strict_order |= args.strict_order;
    config.validate(Path::new("command line"))?;

    let report = run_report(&config)
        .with_context(|| format!("failed to build report from {}", config.input.display()))?;
    info!(
        "Report complete: {} rows, boundary at {}, {} charts",
        report.total_rows,
        report.sections.boundary,
        report.charts.len()
    );

    if let Some(path) = args.datasets_json.as_ref() {
        let json = serde_json::to_string_pretty(&report.sections)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote datasets: {}", path.display());
    }

    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let input = args.input.unwrap_or(config.input);
    let inspection =
        inspect_file(&input).with_context(|| format!("failed to inspect {}", input.display()))?;
    let report = inspection.to_report(&input);

    if args.output.as_os_str() == "-" {
        io::stdout().lock().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Inspection report written: {}", args.output.display());
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReportConfig> {
    ReportConfig::load(path).context("failed to load configuration")
}
