use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use orbital_driver::{
    config::{defaults, ConfigValidator, DriverConfig},
    executor::Executor,
    logger::{setup_logger, LogLevel},
    plan::{orbital_plan, Plan},
    scenarios::{load_scenario, parse_scenario, LEGACY_DEMO},
    tooling::{FlowCli, FlowTooling, RecordingTooling},
};
use std::{path::Path, path::PathBuf, process::ExitCode, sync::Arc};

/// Exit code when the run finished but settlement checks reported findings
const EXIT_FINDINGS: u8 = 2;

/// Demo driver CLI configuration - wrapper for command line parsing
#[derive(Parser, Clone, Debug)]
#[command(name = "orbital-demo")]
#[command(about = "Orbital Auction demo driver for the Flow emulator")]
pub struct CliConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Disable the log file
    #[clap(long)]
    disable_file_logging: bool,

    /// Disable the usage of colors in log
    #[clap(long)]
    disable_log_color: bool,

    /// Log filename
    #[clap(long, default_value_t = String::from(defaults::FILENAME_LOG))]
    filename_log: String,

    /// Logs directory
    #[clap(long, default_value_t = String::from(defaults::LOGS_PATH))]
    logs_path: String,

    /// Path to the flow CLI binary
    #[clap(long, default_value_t = String::from(defaults::FLOW_BINARY))]
    flow_binary: String,

    /// Directory holding flow.json and the Cadence sources
    #[clap(long, default_value_t = String::from(defaults::PROJECT_DIR))]
    project_dir: String,

    /// Flow project file, relative to the project directory
    #[clap(long, default_value_t = String::from(defaults::FLOW_CONFIG))]
    flow_config: String,

    /// Network to use (emulator, testnet, mainnet)
    #[clap(long, default_value_t = String::from(defaults::NETWORK))]
    network: String,

    /// Account that pays for new accounts
    #[clap(long, default_value_t = String::from(defaults::SERVICE_ACCOUNT))]
    service_account: String,

    /// Account hosting the auction
    #[clap(long, default_value_t = String::from(defaults::HOST_ACCOUNT))]
    host_account: String,

    #[clap(long, default_value_t = defaults::BIDDER_COUNT)]
    bidder_count: usize,

    #[clap(long, default_value_t = defaults::NFT_COUNT)]
    nft_count: usize,

    /// DemoToken allowance of the minter
    #[clap(long, default_value_t = String::from(defaults::MINTER_ALLOWANCE))]
    minter_allowance: String,

    #[clap(long, default_value_t = String::from(defaults::HOST_GRANT))]
    host_grant: String,

    #[clap(long, default_value_t = String::from(defaults::BIDDER_GRANT))]
    bidder_grant: String,

    #[clap(long, default_value_t = defaults::EPOCH_COUNT)]
    epoch_count: u64,

    /// Blocks per epoch
    #[clap(long, default_value_t = defaults::EPOCH_LENGTH)]
    epoch_length: u64,

    #[clap(long, default_value_t = defaults::AUCTION_ID)]
    auction_id: u64,

    /// Number of bidding rounds
    #[clap(long, default_value_t = defaults::BID_ROUNDS)]
    bid_rounds: usize,

    /// Comma separated bid per bidder
    #[clap(long, value_delimiter = ',', default_values = defaults::BID_AMOUNTS)]
    bid_amounts: Vec<String>,

    /// Number of epoch update transactions
    #[clap(long, default_value_t = defaults::EPOCH_TICKS)]
    epoch_ticks: usize,

    /// Pause before each phase, in milliseconds
    #[clap(long, default_value_t = 0)]
    pace_ms: u64,

    /// Wait for ENTER at checkpoints
    #[clap(long)]
    interactive: bool,

    /// Enable strict configuration validation
    #[clap(long)]
    strict_validation: bool,

    /// Disable auto-fix of configuration issues
    #[clap(long)]
    no_auto_fix: bool,

    /// JSON File to load the configuration from
    #[clap(long)]
    config_file: Option<String>,

    /// Generate the template at the `config_file` path
    #[clap(long)]
    generate_config_template: bool,

    /// Run a YAML scenario instead of the orbital walkthrough
    #[clap(long, conflicts_with = "legacy")]
    scenario: Option<PathBuf>,

    /// Run the bundled legacy walkthrough
    #[clap(long)]
    legacy: bool,

    /// Execute against an in-process recorder instead of the flow CLI
    #[clap(long)]
    dry_run: bool,

    /// Print the plan and exit
    #[clap(long)]
    print_plan: bool,
}

impl CliConfig {
    /// Convert CLI configuration to DriverConfig
    pub fn to_driver_config(self) -> DriverConfig {
        DriverConfig {
            log_level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            filename_log: self.filename_log,
            logs_path: self.logs_path,
            flow_binary: self.flow_binary,
            project_dir: self.project_dir,
            flow_config: self.flow_config,
            network: self.network,
            service_account: self.service_account,
            host_account: self.host_account,
            bidder_count: self.bidder_count,
            nft_count: self.nft_count,
            minter_allowance: self.minter_allowance,
            host_grant: self.host_grant,
            bidder_grant: self.bidder_grant,
            epoch_count: self.epoch_count,
            epoch_length: self.epoch_length,
            auction_id: self.auction_id,
            bid_rounds: self.bid_rounds,
            bid_amounts: self.bid_amounts,
            epoch_ticks: self.epoch_ticks,
            pace_ms: self.pace_ms,
            interactive: self.interactive,
            auto_fix_config: !self.no_auto_fix,
            strict_validation: self.strict_validation,
        }
    }
}

/// Which walkthrough to run
enum PlanSource {
    Orbital,
    Legacy,
    Scenario(PathBuf),
}

impl PlanSource {
    fn from_cli(cli: &CliConfig) -> Self {
        match (&cli.scenario, cli.legacy) {
            (Some(path), _) => PlanSource::Scenario(path.clone()),
            (None, true) => PlanSource::Legacy,
            (None, false) => PlanSource::Orbital,
        }
    }

    fn build(&self, config: &DriverConfig) -> Result<Plan> {
        let plan = match self {
            PlanSource::Orbital => {
                let params = config.to_demo_params()?;
                orbital_plan(&params).context("Failed to build the orbital plan")?
            }
            PlanSource::Legacy => parse_scenario(LEGACY_DEMO)
                .and_then(|scenario| scenario.compile())
                .context("Failed to build the legacy plan")?,
            PlanSource::Scenario(path) => load_scenario(path)
                .and_then(|scenario| scenario.compile())
                .with_context(|| format!("Failed to build scenario '{}'", path.display()))?,
        };
        Ok(plan)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli_config = CliConfig::parse();

    // Handle config template generation
    if let Some(path) = cli_config.config_file.as_ref() {
        if cli_config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("⚠️  Config file already exists at {path}");
                eprintln!("Use a different path or remove the existing file");
                return Ok(ExitCode::SUCCESS);
            }
            DriverConfig::generate_template(path)?;
            println!("📝 Configuration template generated at {path}");
            println!("💡 Edit the file and run the driver with --config-file {path}");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let source = PlanSource::from_cli(&cli_config);
    let dry_run = cli_config.dry_run;
    let print_plan = cli_config.print_plan;

    // Load and validate configuration
    let config = if let Some(config_path) = &cli_config.config_file {
        println!("📖 Loading configuration from: {config_path}");
        DriverConfig::from_file(
            config_path,
            cli_config.strict_validation,
            !cli_config.no_auto_fix,
        )?
    } else {
        let mut config = cli_config.to_driver_config();
        let validator = ConfigValidator::new(config.strict_validation, config.auto_fix_config);
        let messages = validator.validate(&mut config)?;
        if !messages.is_empty() {
            println!(
                "🔧 Configuration validation completed with {} message(s)",
                messages.len()
            );
        }
        config
    };

    setup_logger(&config.logger_config()).context("Failed to initialize logging")?;
    info!("Orbital demo driver v{} starting...", env!("CARGO_PKG_VERSION"));

    let plan = source.build(&config)?;
    info!(
        "Plan '{}' has {} steps and {} transactions",
        plan.name,
        plan.steps.len(),
        plan.steps.iter().filter(|planned| planned.step.is_transaction()).count()
    );

    if print_plan {
        print!("{plan}");
        return Ok(ExitCode::SUCCESS);
    }

    let tooling: Arc<dyn FlowTooling> = if dry_run {
        info!("Dry run: no calls reach the flow CLI");
        Arc::new(RecordingTooling::for_dry_run(&plan))
    } else {
        let flow = config.to_flow_cli_config();
        info!(
            "Using '{}' on network '{}' in {}",
            flow.binary.display(),
            flow.network,
            flow.project_dir.display()
        );
        Arc::new(FlowCli::new(flow))
    };

    let mut executor = Executor::new(tooling).with_pacing(config.to_pacing());
    let report = match executor.execute(&plan).await {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            for entry in executor.get_log() {
                eprintln!("{entry}");
            }
            return Err(e).context(format!("Plan '{}' aborted", plan.name));
        }
    };

    report.print();

    if report.success() {
        return Ok(ExitCode::SUCCESS);
    }
    warn!("{} settlement finding(s)", report.findings.len());
    Ok(ExitCode::from(EXIT_FINDINGS))
}
