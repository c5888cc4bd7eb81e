//! CLI entry point for the churn data-validation stage.

use anyhow::{Context, Result};
use churn_validation::{
    DatasetSummary, ValidationConfig, ValidationConfigBuilder, ValidationReport, Validator,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Train/test-consistent data validation for churn prediction",
    long_about = "Imputes missing values and dampens outliers with parameters fitted on the \
                  training set, persisting them so test and inference data get identical \
                  transforms.\n\n\
                  EXAMPLES:\n  \
                  # Fit on train, apply to test, export both\n  \
                  churn-validation run --train data/train.csv --test data/test.csv\n\n  \
                  # Clean an inference batch with the persisted parameters\n  \
                  churn-validation apply --input data/batch.csv\n\n  \
                  # Machine-readable report\n  \
                  churn-validation run --train data/train.csv --test data/test.csv --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long, global = true)]
    json: bool,

    /// Write validation_report.json next to the outputs
    #[arg(short = 'r', long, global = true)]
    emit_report: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit on the training file, apply to the test file, export both
    Run {
        /// Path to the training CSV
        #[arg(long)]
        train: PathBuf,

        /// Path to the test CSV
        #[arg(long)]
        test: PathBuf,

        #[command(flatten)]
        settings: Settings,
    },

    /// Clean an inference batch with previously fitted parameters
    Apply {
        /// Path to the CSV batch
        #[arg(short, long)]
        input: PathBuf,

        /// Output file name, written to the test output directory
        ///
        /// Defaults to the input's file name.
        #[arg(long)]
        file_name: Option<String>,

        #[command(flatten)]
        settings: Settings,
    },
}

/// Options shared by both subcommands. Flags override the JSON config.
#[derive(Args, Debug, Default)]
struct Settings {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the persisted parameter artifacts
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Base directory for cleaned datasets (train/ and test/ are created under it)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Column to always treat as text (repeatable; replaces the configured list)
    #[arg(long = "text-column")]
    text_columns: Vec<String>,

    /// IQR multiplier for fitting outlier bounds (apply uses the fitted one)
    #[arg(long)]
    iqr_multiplier: Option<f64>,

    /// Warn about columns without fitted parameters instead of failing
    #[arg(long)]
    lenient: bool,
}

impl Settings {
    fn resolve(&self) -> Result<ValidationConfig> {
        let base = match &self.config {
            Some(path) => ValidationConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ValidationConfig::default(),
        };

        let mut builder = ValidationConfigBuilder::from_config(base);
        if let Some(dir) = &self.artifact_dir {
            builder = builder.artifact_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            builder = builder.output_dir(dir);
        }
        if !self.text_columns.is_empty() {
            builder = builder.text_columns(self.text_columns.clone());
        }
        if let Some(multiplier) = self.iqr_multiplier {
            builder = builder.iqr_multiplier(multiplier);
        }
        if self.lenient {
            builder = builder.strict_columns(false);
        }

        Ok(builder.build()?)
    }
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
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    let result = match &cli.command {
        Command::Run {
            train,
            test,
            settings,
        } => run(&cli, train, test, settings),
        Command::Apply {
            input,
            file_name,
            settings,
        } => apply(&cli, input, file_name.as_deref(), settings),
    };

    if let Err(e) = &result {
        error!("Validation failed: {:#}", e);
    }
    result
}

fn run(cli: &Cli, train: &Path, test: &Path, settings: &Settings) -> Result<()> {
    let config = settings.resolve()?;
    // train/ and test/ share a parent by default; the report goes there.
    let report_dir = config
        .train_output_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.artifact_dir.clone());
    let validator = Validator::from_config(config);

    let output = validator.validate(train, test)?;
    info!(
        "Wrote {} and {}",
        output.train_path.display(),
        output.test_path.display()
    );

    finish(cli, &output.report, &report_dir)
}

fn apply(cli: &Cli, input: &Path, file_name: Option<&str>, settings: &Settings) -> Result<()> {
    let config = settings.resolve()?;
    let report_dir = config.test_output_dir.clone();
    let validator = Validator::from_config(config);

    let file_name = match file_name {
        Some(name) => name.to_string(),
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Cannot derive an output name from {}", input.display()))?,
    };

    let (output, report) = validator.apply_file(input, &file_name)?;
    info!("Wrote {}", output.display());

    finish(cli, &report, &report_dir)
}

/// Print the report and optionally write it to disk.
///
/// Note: This function uses `println!` intentionally for user-facing CLI
/// output, which must stay visible regardless of log level.
fn finish(cli: &Cli, report: &ValidationReport, report_dir: &Path) -> Result<()> {
    if cli.emit_report {
        let path = report.write_to_file(report_dir)?;
        if !cli.json {
            println!("Report written to {}", path.display());
        }
    }

    if cli.json {
        println!("{}", report.to_json_pretty()?);
    } else if !cli.quiet {
        print_summary(report);
    }
    Ok(())
}

fn print_summary(report: &ValidationReport) {
    println!("\n{}", "=".repeat(60));
    println!("DATA VALIDATION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Imputation values: {}", report.imputation_artifact);
    println!("  Outlier bounds:    {}", report.outlier_artifact);
    println!("  IQR multiplier:    {}", report.iqr_multiplier);

    for dataset in &report.datasets {
        print_dataset(dataset);
    }

    println!("\n{}", "-".repeat(60));
    println!(
        "  Total: {} cells imputed, {} values dampened",
        report.total_filled(),
        report.total_dampened()
    );
}

fn print_dataset(dataset: &DatasetSummary) {
    println!();
    println!("{} ({})", dataset.name.to_uppercase(), dataset.mode);
    println!("{}", "-".repeat(40));
    if let Some(input) = &dataset.input_file {
        println!("  Input:  {}", input);
    }
    if let Some(output) = &dataset.output_file {
        println!("  Output: {}", output);
    }
    println!("  Shape:  {} rows x {} columns", dataset.rows, dataset.columns);

    let filled: Vec<_> = dataset.imputation.fills.iter().filter(|f| f.filled > 0).collect();
    if !filled.is_empty() {
        println!("  Imputed:");
        for fill in filled {
            println!(
                "    {:<20} {:>6} cells <- {}",
                truncate_str(&fill.column, 19),
                fill.filled,
                fill.value
            );
        }
    }

    let dampened: Vec<_> = dataset
        .outliers
        .corrections
        .iter()
        .filter(|c| c.dampened > 0)
        .collect();
    if !dampened.is_empty() {
        println!("  Dampened:");
        for correction in dampened {
            println!(
                "    {:<20} {:>6} values outside [{:.4}, {:.4}]",
                truncate_str(&correction.column, 19),
                correction.dampened,
                correction.lower,
                correction.upper
            );
        }
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
