use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::OpenOptions;
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use sector_carver::cli::Args;
use sector_carver::report::{create_report_metadata, RecoveryReport};
use sector_carver::sink::{dispatch, DigestOnlySink, DirectorySink};
use sector_carver::{Carver, DiskImage, ScanProgress};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate().context("Invalid arguments")?;
    init_logging(&args)?;

    println!("Sector Carver v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "=".repeat(60));

    let disk = DiskImage::open(&args.image)
        .with_context(|| format!("Failed to open {}", args.image.display()))?;
    println!(
        "Image: {} ({} bytes)",
        disk.path().display(),
        disk.size().as_u64()
    );

    let config = args.scan_config()?;
    let algorithm = args.digest_algorithm()?;
    debug!("Scan configuration: {:?}", config);

    // progress events are drained on their own thread so carving never waits
    let (tx, rx) = mpsc::unbounded_channel();
    let progress = thread::spawn(move || print_progress(rx));

    let carver = Carver::new(config.clone()).with_progress(tx);
    let carve = carver.scan(disk.as_bytes()).context("Scan failed")?;
    drop(carver);
    let _ = progress.join();

    let outcomes = if args.dry_run {
        info!("Dry run, nothing is written to disk");
        dispatch(&carve.files, &DigestOnlySink { algorithm }, config.parallel_sink)
    } else {
        let sink = DirectorySink::create(&args.output, algorithm).with_context(|| {
            format!("Failed to create output directory {}", args.output.display())
        })?;
        dispatch(&carve.files, &sink, config.parallel_sink)
    };

    let output_dir = args.output.display().to_string();
    let metadata = create_report_metadata(
        &disk.path().display().to_string(),
        disk.size().as_u64(),
        (!args.dry_run).then_some(output_dir.as_str()),
        env!("CARGO_PKG_VERSION"),
    );
    let report = RecoveryReport::build(metadata, &carve, &outcomes);

    println!();
    print!("{}", report.render_text());

    if let Some(ref path) = args.json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("JSON report: {}", path.display());
    }

    if let Some(ref path) = args.html {
        report
            .write_html(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("HTML report: {}", path.display());
    }

    Ok(())
}

/// Terminal logger on stderr, plus a file logger when --log is given
fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = args.log_level();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    if let Some(ref path) = args.log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        loggers.push(WriteLogger::new(
            level,
            ConfigBuilder::new().set_time_format_rfc3339().build(),
            file,
        ));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

/// One summary line per format as its scan completes
fn print_progress(mut rx: UnboundedReceiver<ScanProgress>) {
    while let Some(event) = rx.blocking_recv() {
        if let ScanProgress::FormatFinished(format, stats) = event {
            eprintln!(
                "[{:>6}] {} carved, {} rejected, {} skipped",
                format.as_str(),
                stats.carved,
                stats.rejected,
                stats.discarded
            );
        }
    }
}
