//! Mirrored-Volume Operator CLI
//!
//! One invocation is one reconcile run: build the request from flags or
//! a request file, run the Validate → Discover → Decide → Mutate
//! pipeline against the array, and print a single JSON result document
//! to stdout. Logs go to stderr.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mirrored_volume_operator::{
    ReconcileOutcome, RequestedTopology, RestGateway, RestGatewayConfig, VolumeReconciler,
    VolumeRequest,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Mirrored-Volume Operator - converge a volume to its declared topology
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Array management endpoint, e.g. https://array1:7443
    #[arg(long, env = "ARRAY_ENDPOINT")]
    endpoint: String,

    /// Array management username
    #[arg(long, env = "ARRAY_USERNAME")]
    username: String,

    /// Array management password
    #[arg(long, env = "ARRAY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Skip TLS certificate verification
    #[arg(long, env = "ARRAY_INSECURE")]
    insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ARRAY_TIMEOUT", default_value = "60")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Read the request from a YAML or JSON file instead of flags
    #[arg(long)]
    request_file: Option<PathBuf>,

    /// Volume name
    #[arg(long, required_unless_present = "request_file")]
    name: Option<String>,

    /// Desired state (present, absent)
    #[arg(long, default_value = "present")]
    state: String,

    /// Requested topology (standard, local-hyperswap)
    #[arg(long = "volume-type")]
    volume_type: Option<String>,

    /// First placement pool
    #[arg(long)]
    pool_a: Option<String>,

    /// Second placement pool
    #[arg(long)]
    pool_b: Option<String>,

    /// Capacity in MiB; immutable after creation
    #[arg(long)]
    size: Option<u64>,

    /// Thin-provision the copies
    #[arg(long)]
    thin: bool,

    /// Compress the copies
    #[arg(long)]
    compressed: bool,

    /// Deduplicate the copies
    #[arg(long)]
    deduplicated: bool,

    /// Grain size for thin copies, in KiB
    #[arg(long)]
    grainsize: Option<u32>,

    /// Real-capacity percentage for thin copies, e.g. 2%
    #[arg(long)]
    rsize: Option<String>,
}

// =============================================================================
// Main
// =============================================================================

/// Failure document printed on stdout when the run does not converge
#[derive(Debug, Serialize)]
struct FailureDoc {
    changed: bool,
    failed: bool,
    message: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
        }
        Err(err) => {
            let doc = FailureDoc {
                changed: false,
                failed: true,
                message: format!("{:#}", err),
            };
            println!("{}", serde_json::to_string_pretty(&doc).unwrap());
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<ReconcileOutcome> {
    let request = build_request(args)?;

    info!("Starting Mirrored-Volume Operator");
    info!("  Version: {}", mirrored_volume_operator::VERSION);
    info!("  Endpoint: {}", args.endpoint);
    info!("  Volume: {} (state: {})", request.name, request.state);

    let gateway = RestGateway::new(RestGatewayConfig {
        endpoint: args.endpoint.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
        verify_tls: !args.insecure,
        timeout: Duration::from_secs(args.timeout_secs),
    })?;

    let reconciler = VolumeReconciler::new(Arc::new(gateway));
    let outcome = reconciler.reconcile(&request).await?;

    info!(
        "Reconcile finished: changed={} ({})",
        outcome.changed, outcome.message
    );
    Ok(outcome)
}

// =============================================================================
// Request Construction
// =============================================================================

fn build_request(args: &Args) -> anyhow::Result<VolumeRequest> {
    if let Some(path) = &args.request_file {
        return load_request(path);
    }

    let name = args
        .name
        .clone()
        .context("--name is required without --request-file")?;

    Ok(VolumeRequest {
        name,
        state: args.state.parse()?,
        topology: args
            .volume_type
            .as_deref()
            .map(|raw| raw.parse::<RequestedTopology>())
            .transpose()?,
        pool_a: args.pool_a.clone(),
        pool_b: args.pool_b.clone(),
        size: args.size,
        thin: args.thin,
        compressed: args.compressed,
        deduplicated: args.deduplicated,
        grainsize: args.grainsize,
        rsize: args.rsize.clone(),
    })
}

fn load_request(path: &Path) -> anyhow::Result<VolumeRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse request file {}", path.display()))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    // stdout carries only the result document.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
