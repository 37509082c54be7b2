use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lateral_recon::{
    aggregator::{FingerprintAggregator, HostTarget},
    analyzer::analyze_stolen_credentials,
    collector::{builtin_collectors, collect_with_deadline},
    config::Config,
    events::{AgentEventQueue, AgentId},
    fingerprinter::{all_fingerprinters, builtin_fingerprinters, PortScanMap},
    model::{Credentials, PortScanData},
    output::{
        print_analysis, print_credentials, print_fingerprints, print_index, print_release,
        OutputFormat,
    },
    plugin::{
        version::parse_version, AgentPluginRepositoryIndex, AgentPluginType,
        CredentialsCollectorPluginFactory, FingerprinterPluginFactory, PluginFactory,
    },
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit codes for scripted runs
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const CREDENTIALS_MISMATCH: u8 = 2;
}

#[derive(Parser)]
#[command(name = "lateral-recon")]
#[command(
    author,
    version,
    about = "Fingerprint hosts and collect credentials for lateral-movement simulation"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint one or more hosts
    Fingerprint {
        /// Hosts to probe
        #[arg(required = true)]
        hosts: Vec<IpAddr>,

        /// JSON list of port-scan observations applied to every host
        #[arg(long)]
        port_scan: Option<PathBuf>,

        /// Fingerprinters to run, in OS-resolution order (repeatable)
        #[arg(long = "fingerprinter")]
        fingerprinters: Vec<String>,

        /// Per-probe timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Run a credential collector
    Collect {
        /// Collector plugin name
        plugin: String,

        /// pypykatz JSON dump to read
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Plugin repository index used to resolve the release
        #[arg(long)]
        index: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Inspect a plugin repository index
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },

    /// Compare stolen credentials against the expected set
    Compare {
        /// JSON list of credentials that should have been stolen
        #[arg(long)]
        expected: PathBuf,

        /// JSON list of credentials that were stolen
        #[arg(long)]
        stolen: PathBuf,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List plugins built into this agent
    ListPlugins,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Print every release listed in the index
    Show {
        file: PathBuf,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// Pick the release a factory would load
    Resolve {
        file: PathBuf,

        /// Plugin type (exploiter, credentials-collector, fingerprinter, payload)
        plugin_type: String,

        name: String,

        /// Exact release instead of the latest
        #[arg(long)]
        version: Option<String>,

        #[arg(short, long)]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "lateral_recon=debug"
    } else {
        "lateral_recon=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Fingerprint {
            hosts,
            port_scan,
            fingerprinters,
            timeout_ms,
            format,
        } => {
            let format = parse_format(format, &config)?;
            run_fingerprint(&config, hosts, port_scan, fingerprinters, timeout_ms, format).await
        }
        Commands::Collect {
            plugin,
            dump,
            index,
            format,
        } => {
            let format = parse_format(format, &config)?;
            run_collect(&config, &plugin, dump, index, format).await
        }
        Commands::Index { command } => run_index(&config, command),
        Commands::Compare {
            expected,
            stolen,
            format,
        } => {
            let format = parse_format(format, &config)?;
            run_compare(&expected, &stolen, format)
        }
        Commands::ListPlugins => {
            list_plugins(&config);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(&config_path, init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn parse_format(format: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = format.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

fn load_port_scan(path: &Path) -> Result<PortScanMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read port scan: {:?}", path))?;
    let observations: Vec<PortScanData> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse port scan: {:?}", path))?;

    Ok(observations
        .into_iter()
        .map(|data| (data.port, data))
        .collect())
}

fn load_credentials(path: &Path) -> Result<Vec<Credentials>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse credentials: {:?}", path))
}

fn new_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Fingerprinting hosts...")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_fingerprint(
    config: &Config,
    hosts: Vec<IpAddr>,
    port_scan: Option<PathBuf>,
    fingerprinters: Vec<String>,
    timeout_ms: Option<u64>,
    format: OutputFormat,
) -> Result<u8> {
    let port_scan_data = match port_scan {
        Some(path) => load_port_scan(&path)?,
        None => PortScanMap::new(),
    };
    let fingerprinters = if fingerprinters.is_empty() {
        config.scan.fingerprinters.clone()
    } else {
        fingerprinters
    };
    let probe_timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.scan.probe_timeout());

    let registry = builtin_fingerprinters(probe_timeout);
    let factory = FingerprinterPluginFactory::new(
        AgentId::new_v4(),
        Arc::new(AgentEventQueue::new()),
        Arc::new(registry),
    );
    let aggregator = FingerprintAggregator::new(factory, fingerprinters)
        .with_options(config.fingerprinter_options.clone())
        .with_deadline(config.scan.operation_deadline())
        .with_max_concurrent_probes(config.scan.max_concurrent_probes)
        .with_max_concurrent_hosts(config.scan.max_concurrent_hosts);

    let targets: Vec<HostTarget> = hosts
        .into_iter()
        .map(|host| HostTarget::new(host, port_scan_data.clone()))
        .collect();

    let progress = (format == OutputFormat::Table).then(|| new_progress_bar(targets.len()));
    let results = aggregator
        .fingerprint_hosts(&targets, |_| {
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        })
        .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    print_fingerprints(&results?, format)?;
    Ok(exit_codes::SUCCESS)
}

async fn run_collect(
    config: &Config,
    plugin: &str,
    dump: Option<PathBuf>,
    index: Option<PathBuf>,
    format: OutputFormat,
) -> Result<u8> {
    let dump = dump.or_else(|| config.collection.lsa_dump.clone());
    let mut registry = builtin_collectors(dump);

    if let Some(path) = index.or_else(|| config.plugin_index.clone()) {
        let index = AgentPluginRepositoryIndex::load(&path)?;
        registry = registry.with_repository_index(Arc::new(index), config.agent_version()?);
    }

    let queue = Arc::new(AgentEventQueue::new());
    queue.subscribe_all(|event| {
        info!(
            source = %event.source,
            tags = ?event.tags,
            credentials = event.stolen_credentials().map_or(0, |c| c.len()),
            "Published event"
        );
    });

    let factory = CredentialsCollectorPluginFactory::new(AgentId::new_v4(), queue, Arc::new(registry));
    let plugin = factory.create(plugin)?;
    if let Some(version) = plugin.version() {
        info!(plugin = plugin.name(), %version, "Resolved plugin release");
    }

    let credentials = collect_with_deadline(plugin, config.collection.deadline()).await;
    print_credentials(&credentials, format)?;
    Ok(exit_codes::SUCCESS)
}

fn run_index(config: &Config, command: IndexCommand) -> Result<u8> {
    match command {
        IndexCommand::Show { file, format } => {
            let index = AgentPluginRepositoryIndex::load(&file)?;
            print_index(&index, parse_format(format, config)?)?;
        }
        IndexCommand::Resolve {
            file,
            plugin_type,
            name,
            version,
            format,
        } => {
            let index = AgentPluginRepositoryIndex::load(&file)?;
            let plugin_type = AgentPluginType::from_str(&plugin_type).map_err(|e| anyhow::anyhow!(e))?;
            let version = version.as_deref().map(parse_version).transpose()?;

            index.check_compatibility(&config.agent_version()?)?;
            let release = index.resolve(plugin_type, &name, version.as_ref())?;
            print_release(release, parse_format(format, config)?)?;
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn run_compare(expected: &Path, stolen: &Path, format: OutputFormat) -> Result<u8> {
    let expected = load_credentials(expected)?;
    let stolen = load_credentials(stolen)?;

    let analysis = analyze_stolen_credentials(&expected, &stolen);
    print_analysis(&analysis, format)?;

    if analysis.is_match() {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::CREDENTIALS_MISMATCH)
    }
}

fn list_plugins(config: &Config) {
    println!("Fingerprinters:");
    println!();
    for fingerprinter in all_fingerprinters(config.scan.probe_timeout()) {
        let enabled = config
            .scan
            .fingerprinters
            .iter()
            .any(|name| name == fingerprinter.name());
        println!(
            "  {:<12} [enabled: {}]",
            fingerprinter.name(),
            if enabled { "yes" } else { "no" }
        );
    }

    println!();
    println!("Credential collectors:");
    println!();
    for name in builtin_collectors(None).names() {
        println!("  {}", name);
    }
}

fn handle_config(config_path: &Path, init: bool, show_path: bool) -> Result<()> {
    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if !Config::init_at(config_path)? {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'lateral-recon config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
