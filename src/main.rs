use anyhow::{Context, Result};
use audioslicer::batch::{BatchEvent, BatchOutcome, BatchRequest, BatchRunner, ChannelSink};
use audioslicer::config::{Config, FailurePolicy, SampleFormat};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audioslicer")]
#[command(version, about = "Slice audio files on silence")]
#[command(long_about = "Split WAV files into slices at silent passages and optionally write a JSON mapping of which slices came from which file.")]
struct Cli {
    /// Input WAV files or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (defaults to each input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write a JSON slice mapping to this file
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Silence threshold in dB
    #[arg(short, long, allow_hyphen_values = true)]
    threshold: Option<f64>,

    /// Minimum slice length in milliseconds
    #[arg(long)]
    min_length: Option<u32>,

    /// Minimum silence length in milliseconds for a cut
    #[arg(long)]
    min_interval: Option<u32>,

    /// RMS frame hop in milliseconds
    #[arg(long)]
    hop_size: Option<u32>,

    /// Maximum silence kept around slices in milliseconds
    #[arg(long)]
    max_silence_kept: Option<u32>,

    /// Output sample format: pcm16, float32
    #[arg(long)]
    sample_format: Option<String>,

    /// Record failing files in the report and keep going
    #[arg(short, long)]
    keep_going: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Expand directories to their `.wav` files and drop anything that is not a WAV.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_wav(p))
                .collect();
            found.sort();
            if found.is_empty() {
                warn!("No WAV files in {}", input.display());
            }
            files.extend(found);
        } else if is_wav(input) {
            files.push(input.clone());
        } else {
            warn!("Skipping {}: not a WAV file", input.display());
        }
    }

    Ok(files)
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(v) = cli.threshold {
        config.threshold = v;
    }
    if let Some(v) = cli.min_length {
        config.min_length = v;
    }
    if let Some(v) = cli.min_interval {
        config.min_interval = v;
    }
    if let Some(v) = cli.hop_size {
        config.hop_size = v;
    }
    if let Some(v) = cli.max_silence_kept {
        config.max_silence_kept = v;
    }
    if let Some(ref format) = cli.sample_format {
        config.sample_format = format
            .parse::<SampleFormat>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if cli.keep_going {
        config.failure_policy = FailurePolicy::Continue;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli)?;
    config.validate().context("Invalid slicing parameters")?;

    let paths = collect_inputs(&cli.inputs)?;
    if paths.is_empty() {
        anyhow::bail!("No WAV files to slice");
    }

    info!("Files:      {}", paths.len());
    info!(
        "Output:     {}",
        cli.output_dir
            .as_ref()
            .map_or("(next to inputs)".to_string(), |d| d.display().to_string())
    );
    if let Some(ref report) = cli.report {
        info!("Report:     {}", report.display());
    }
    info!(
        "Parameters: threshold {} dB, min length {} ms, min interval {} ms, hop {} ms, max silence {} ms",
        config.threshold,
        config.min_length,
        config.min_interval,
        config.hop_size,
        config.max_silence_kept
    );

    let mut request = BatchRequest::new(paths, config.slice_parameters())
        .with_sample_format(config.sample_format)
        .with_failure_policy(config.failure_policy);
    if let Some(dir) = cli.output_dir {
        request = request.with_output_dir(dir);
    }
    if let Some(report) = cli.report {
        request = request.with_report(report);
    }

    let runner = BatchRunner::default();
    let (sink, mut events) = ChannelSink::new();
    let handle = runner.start(request, Arc::new(sink))?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Started { total } => pb.set_length(total as u64),
            BatchEvent::FileCompleted { completed } => pb.set_position(completed as u64),
            BatchEvent::Completed(_) => {
                pb.finish_with_message("done");
                break;
            }
            BatchEvent::Failed(message) => {
                pb.abandon_with_message(message);
                break;
            }
        }
    }

    let outcome = handle.wait().await.context("Slicing aborted")?;
    print_summary(&outcome);

    Ok(())
}

fn print_summary(outcome: &BatchOutcome) {
    let stats = &outcome.stats;
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                       Slicing complete!                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Files:      {}/{}", stats.files_completed, stats.files_total);
    println!("  Slices:     {}", stats.slices_written);
    if let Some(ref report) = outcome.report_path {
        println!("  Report:     {}", report.display());
    }
    println!("  Time:       {:.2}s", stats.total_time.as_secs_f64());
    if stats.files_failed > 0 {
        println!();
        println!("  Failed:");
        for task in outcome.mapping.tasks.iter().filter(|t| t.is_failed()) {
            println!(
                "    {}: {}",
                task.original_file,
                task.error.as_deref().unwrap_or_default()
            );
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
