use anyhow::Context;
use clap::{error::ErrorKind, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use slow_query_doctor::config::{DEFAULT_MIN_DURATION_MS, DEFAULT_TOP_N};
use slow_query_doctor::{
    AnalysisConfig, AnalysisReport, Analyzer, JsonFormatter, LogFormat, ParseSummary,
    ProgressObserver, RecommendationConfig, RecommendationRunner, RecommendationStatus,
    RepresentativePolicy, SlowQueryError, StaticAdvisor, TextFormatter,
};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const EXIT_FAILURE: i32 = 1;
const EXIT_NO_MATCHES: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Parser)]
#[clap(
    name = "slow-query-doctor",
    version,
    about = "Find the slow queries that cost the most in PostgreSQL logs"
)]
struct Arguments {
    /// PostgreSQL log file to analyze
    #[clap(value_name = "LOG_FILE")]
    log_file: PathBuf,

    /// Log format: plain (stderr), csv (csvlog) or json (jsonlog)
    #[clap(short = 'f', long, default_value = "plain")]
    format: String,

    /// Ignore statements faster than this many milliseconds
    #[clap(long, value_name = "MS", default_value_t = DEFAULT_MIN_DURATION_MS)]
    min_duration: f64,

    /// Number of queries to report
    #[clap(short = 'n', long, value_name = "N", default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Which occurrence is shown for a query: longest, first-seen or slowest
    #[clap(long, default_value = "longest")]
    representative: String,

    /// Output format for results
    #[clap(long, value_enum, default_value = "text")]
    output_format: OutputFormat,

    /// Write results to this file instead of stdout (- for stdout)
    #[clap(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip the per-query recommendations
    #[clap(long)]
    no_recommendations: bool,

    /// Recommendation requests in flight at once
    #[clap(long, default_value_t = 4)]
    concurrency: usize,

    /// don't print anything but the results, not even a progress spinner.
    #[clap(short = 'q', long)]
    quiet: bool,

    /// Enable debug logging
    #[clap(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, ValueEnum, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

/// Progress spinner fed by the pipeline
struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressObserver for SpinnerProgress {
    fn on_progress(&self, summary: &ParseSummary) {
        self.bar.set_message(format!(
            "{} entries read, {} slow queries",
            summary.total_entries_seen, summary.entries_parsed
        ));
    }

    fn on_finish(&self, _summary: &ParseSummary) {
        self.bar.finish_and_clear();
    }
}

#[tokio::main]
async fn main() {
    let args = match Arguments::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(EXIT_FAILURE);
        }
    };

    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        let code = match e.downcast_ref::<SlowQueryError>() {
            Some(SlowQueryError::NoMatchingEntries { .. }) => EXIT_NO_MATCHES,
            _ => EXIT_FAILURE,
        };
        eprintln!("Error: {:#}", e);
        process::exit(code);
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

/// Raise the cancel flag; false when it was already raised
fn first_interrupt(flag: &AtomicBool) -> bool {
    !flag.swap(true, Ordering::SeqCst)
}

fn build_config(args: &Arguments) -> slow_query_doctor::Result<AnalysisConfig> {
    let format: LogFormat = args.format.parse()?;
    let representative: RepresentativePolicy = args.representative.parse()?;
    let config = AnalysisConfig::new(format)
        .with_min_duration(args.min_duration)
        .with_top_n(args.top_n)
        .with_representative(representative);
    config.validate()?;
    Ok(config)
}

async fn run(args: Arguments) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let config = build_config(&args)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        if first_interrupt(&flag) {
            info!("Received interrupt, finishing with what has been read");
        } else {
            eprintln!("Interrupted again, exiting");
            process::exit(EXIT_INTERRUPTED);
        }
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let report = analyze(&args, config, cancel).await?;

    let recommendations = if args.no_recommendations || report.queries.is_empty() {
        None
    } else {
        let runner = RecommendationRunner::new(
            Arc::new(StaticAdvisor::new()),
            RecommendationConfig {
                concurrency: args.concurrency,
                ..RecommendationConfig::default()
            },
        )?;
        info!(
            "Requesting recommendations from {} for {} queries",
            runner.provider_name(),
            report.queries.len()
        );
        Some(runner.run(&report.queries).await)
    };

    write_output(&args, &report, recommendations.as_deref())?;

    if !args.quiet {
        eprintln!(
            "Analysis completed in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

async fn analyze(
    args: &Arguments,
    config: AnalysisConfig,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<AnalysisReport> {
    let path = args.log_file.clone();
    let quiet = args.quiet;

    let report = tokio::task::spawn_blocking(move || {
        let spinner = (!quiet).then(SpinnerProgress::new);
        let mut analyzer = Analyzer::new(config).with_cancel_flag(cancel);
        if let Some(spinner) = &spinner {
            analyzer = analyzer.with_observer(spinner);
        }
        let result = analyzer.analyze_file(&path);
        if let Some(spinner) = &spinner {
            spinner.bar.finish_and_clear();
        }
        result
    })
    .await
    .context("analysis task failed")??;

    if report.summary.interrupted {
        warn!(
            "Interrupted after {} entries; results cover only the part of the log read",
            report.summary.total_entries_seen
        );
    }

    Ok(report)
}

fn write_output(
    args: &Arguments,
    report: &AnalysisReport,
    recommendations: Option<&[RecommendationStatus]>,
) -> anyhow::Result<()> {
    let output = match args.output_format {
        OutputFormat::Json => JsonFormatter::new()
            .with_pretty(true)
            .with_metadata(env!("CARGO_PKG_VERSION"), &args.log_file.display().to_string())
            .format(report, recommendations)?,
        OutputFormat::Text => TextFormatter::new().format(report, recommendations)?,
    };

    match &args.output {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, &output)
                .with_context(|| format!("failed to write results to {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        _ => println!("{}", output),
    }

    Ok(())
}
