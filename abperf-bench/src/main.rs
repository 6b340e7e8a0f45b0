use abperf_bench::config::{parse_duration, BenchConfig};
use abperf_bench::report;
use abperf_bench::scenario::{total_duration, RampingRunner};
use abperf_bench::worker;
use abperf_client::HttpTransport;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abperf", about = "A/B latency comparison of two HTTP endpoints")]
struct Args {
    /// JSON config file; omitted fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// URL of the first endpoint (overrides ENDPOINT1_URL)
    #[arg(long)]
    endpoint1_url: Option<String>,

    /// URL of the second endpoint (overrides ENDPOINT2_URL)
    #[arg(long)]
    endpoint2_url: Option<String>,

    /// Per-request timeout, e.g. 30s or 500ms
    #[arg(long)]
    timeout: Option<String>,

    /// Where to write the JSON summary
    #[arg(long, default_value = "summary.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(3);
    });

    let (first, second) = (&config.endpoints[0], &config.endpoints[1]);
    println!("Comparing  {} {}  |  {} {}", first.name, first.url, second.name, second.url);
    println!("Profile:   {} stages, {}s total", config.stages.len(), total_duration(&config.stages).as_secs());

    let runner = RampingRunner::new(config.pacing);
    let run_report = worker::run(&config, Arc::new(HttpTransport::new()), &runner)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Run failed: {e}");
            process::exit(3);
        });

    println!();
    print!("{}", report::render_text(&run_report));
    println!();
    print!("{}", report::render_thresholds(&run_report.thresholds));

    let doc = report::document(&run_report);
    if let Err(e) = report::write_document(&doc, &args.output) {
        eprintln!("{e}");
        process::exit(2);
    }
    println!("Summary written to {}", args.output.display());

    process::exit(if run_report.thresholds_passed() { 0 } else { 1 });
}

/// Defaults < config file < environment < CLI flags, then validate.
fn load_config(args: &Args) -> abperf_common::Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)?,
        None => BenchConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());

    for (idx, url) in [&args.endpoint1_url, &args.endpoint2_url].into_iter().enumerate() {
        if let (Some(endpoint), Some(url)) = (config.endpoints.get_mut(idx), url) {
            endpoint.url = url.clone();
        }
    }
    if let Some(raw) = &args.timeout {
        config.request_timeout = parse_duration(raw)?;
    }

    config.validate()?;
    Ok(config)
}
