//! CLI entry point for the imputation engine.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_imputation::{
    GroupFallbackSource, ImputationConfig, ImputationConfigBuilder, ImputationEngine,
    JointPassMode, MissingnessAnalyzer, ReportGenerator,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// CLI-compatible joint pass scheduling
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliJointPass {
    /// One KNN and one MICE pass after all columns are decided
    Batched,
    /// A joint pass at each KNN/MICE column's turn
    PerColumn,
}

impl From<CliJointPass> for JointPassMode {
    fn from(cli: CliJointPass) -> Self {
        match cli {
            CliJointPass::Batched => JointPassMode::Batched,
            CliJointPass::PerColumn => JointPassMode::PerColumn,
        }
    }
}

/// CLI-compatible group fallback source
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGroupFallback {
    /// Global statistic of the column after the grouped fill
    Working,
    /// Global statistic of the column before any fill
    Original,
}

impl From<CliGroupFallback> for GroupFallbackSource {
    fn from(cli: CliGroupFallback) -> Self {
        match cli {
            CliGroupFallback::Working => GroupFallbackSource::Working,
            CliGroupFallback::Original => GroupFallbackSource::Original,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Rule-based missing value imputation with a quality gate",
    long_about = "Decides, applies and validates an imputation method for every column with \
                  missing values, then reports a PASS/WARN/STOP quality gate.\n\n\
                  EXAMPLES:\n  \
                  # Impute and print a summary\n  \
                  lex-imputation -i sales.csv\n\n  \
                  # Group-wise fills, write the table and a report\n  \
                  lex-imputation -i sales.csv -g region -o results/ -r\n\n  \
                  # Preview the decisions without imputing\n  \
                  lex-imputation -i sales.csv --dry-run\n\n  \
                  # Report JSON only, for piping\n  \
                  lex-imputation -i sales.csv --json | jq .status"
)]
struct Args {
    /// Path to the CSV file to impute
    #[arg(short, long)]
    input: String,

    /// Categorical column used for per-group fills
    #[arg(short, long)]
    group_column: Option<String>,

    /// Output directory for the imputed table and report
    ///
    /// The imputed table is only written when this is given
    #[arg(short, long)]
    output: Option<String>,

    /// Custom output file name (without extension)
    ///
    /// If not specified, uses "<input_name>_imputed"
    #[arg(long)]
    output_name: Option<String>,

    /// JSON file with an imputation configuration
    ///
    /// Missing fields keep their defaults; command-line flags override it
    #[arg(short, long)]
    config: Option<String>,

    /// Random seed for KNN/MICE
    #[arg(long)]
    seed: Option<u64>,

    /// Number of neighbors for KNN imputation
    #[arg(long)]
    knn_neighbors: Option<usize>,

    /// How KNN/MICE joint passes are scheduled
    #[arg(long, value_enum)]
    joint_pass: Option<CliJointPass>,

    /// Source of the global fallback for group fills
    #[arg(long, value_enum)]
    group_fallback: Option<CliGroupFallback>,

    /// Show column profiles and planned decisions without imputing
    #[arg(long)]
    dry_run: bool,

    /// Output the report JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the report JSON is printed.
    #[arg(long)]
    json: bool,

    /// Write a JSON report to the output directory
    ///
    /// The report will be saved as <input_name>_imputation_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;

    info!("Loading dataset from: {}", args.input);
    let data = load_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let mut builder = ImputationEngine::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let engine = builder.build()?;

    if args.dry_run {
        return run_dry_run(&args, &engine, &data);
    }

    run_engine(&engine, &args, data)
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &Args) -> Result<ImputationConfig> {
    let base = match args.config {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            let config: ImputationConfig = serde_json::from_str(&content)
                .with_context(|| format!("Invalid config file: {}", path))?;
            debug!("Loaded configuration from {}", path);
            config
        }
        None => ImputationConfig::default(),
    };

    let mut builder = ImputationConfigBuilder::from_config(base);
    if let Some(ref group) = args.group_column {
        builder = builder.group_column(group);
    }
    if let Some(seed) = args.seed {
        builder = builder.random_seed(seed);
    }
    if let Some(k) = args.knn_neighbors {
        builder = builder.knn_neighbors(k);
    }
    if let Some(mode) = args.joint_pass {
        builder = builder.joint_pass_mode(mode.into());
    }
    if let Some(source) = args.group_fallback {
        builder = builder.group_fallback_source(source.into());
    }

    Ok(builder.build()?)
}

/// Show what a run would do without imputing anything.
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_dry_run(args: &Args, engine: &ImputationEngine, data: &DataFrame) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of imputation decisions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", data.height());
    println!("  Columns: {}", data.width());
    if let Some(ref group) = engine.config().group_column {
        let status = if data.column(group).is_ok() {
            "present"
        } else {
            "NOT FOUND"
        };
        println!("  Group column: {} ({})", group, status);
    }
    println!();

    println!("COLUMN PROFILES");
    println!("{}", "-".repeat(40));
    println!("{:<20} {:<12} {:>8} {:>10}", "Column", "Type", "Missing", "Missing %");
    println!("{}", "-".repeat(54));
    for profile in MissingnessAnalyzer::analyze(data) {
        println!(
            "{:<20} {:<12} {:>8} {:>10.1}",
            profile.name,
            profile.logical_type.as_str(),
            profile.missing_count,
            profile.missing_ratio * 100.0
        );
    }
    println!();

    println!("PLANNED DECISIONS");
    println!("{}", "-".repeat(40));
    print!("{}", ReportGenerator::render_plan(&engine.plan(data)));
    println!();

    if let Some(ref output) = args.output {
        let generator = ReportGenerator::new(PathBuf::from(output), args.output_name.clone());
        let input_stem = extract_file_stem(&args.input);
        println!("OUTPUT FILES (will be created)");
        println!("{}", "-".repeat(40));
        println!("  - {}", generator.table_path(&input_stem).display());
        if args.emit_report {
            println!("  - {}/{}_imputation_report.json", output, input_stem);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!("To impute, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Run the engine and handle its output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print the report JSON to stdout only (no logs)
/// - `--emit-report`: Write the run report to a file
fn run_engine(engine: &ImputationEngine, args: &Args, data: DataFrame) -> Result<()> {
    let mut outcome = engine.run(data).map_err(|e| {
        error!("Imputation failed: {}", e);
        anyhow!("Imputation failed [{}]: {}", e.error_code(), e)
    })?;

    let input_stem = extract_file_stem(&args.input);
    let output_dir = PathBuf::from(args.output.as_deref().unwrap_or("."));
    let generator = ReportGenerator::new(output_dir, args.output_name.clone());

    let output_file = match args.output {
        Some(_) => Some(generator.write_table(&mut outcome.table, &input_stem)?),
        None => None,
    };
    let output_file = output_file.map(|p| p.display().to_string());

    let report = ReportGenerator::build_run_report(&args.input, output_file.as_deref(), &outcome);

    if args.emit_report {
        let report_path = generator.write_report_to_file(&report, &input_stem)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", outcome.report.to_json_pretty()?);
        return Ok(());
    }

    print!("{}", ReportGenerator::render_summary(&report));
    Ok(())
}

/// Load a CSV file, parsing date columns so they are recognized as datetime.
fn load_csv(path: &str) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_try_parse_dates(true),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .with_context(|| format!("Failed to read CSV file: {}", path))
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}
