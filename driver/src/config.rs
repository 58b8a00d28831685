use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cadence::UFix64;
use crate::logger::{LogLevel, LoggerConfig};
use crate::orchestrator::Pacing;
use crate::plan::DemoParams;
use crate::tooling::FlowCliConfig;

/// Default values for configuration
pub mod defaults {
    use super::*;

    pub const LOG_LEVEL: LogLevel = LogLevel::Info;
    pub const FILENAME_LOG: &str = "orbital-demo.log";
    pub const LOGS_PATH: &str = "logs/";

    // Tooling
    pub const FLOW_BINARY: &str = "flow";
    pub const PROJECT_DIR: &str = ".";
    pub const FLOW_CONFIG: &str = "flow.json";
    pub const NETWORK: &str = "emulator";
    pub const SERVICE_ACCOUNT: &str = "emulator-account";

    // Demo parameters
    pub const HOST_ACCOUNT: &str = "Auction";
    pub const BIDDER_COUNT: usize = 6;
    pub const NFT_COUNT: usize = 10;
    pub const MINTER_ALLOWANCE: &str = "1000000.0";
    pub const HOST_GRANT: &str = "100000.0";
    pub const BIDDER_GRANT: &str = "100000.0";
    pub const EPOCH_COUNT: u64 = 8;
    pub const EPOCH_LENGTH: u64 = 12;
    pub const AUCTION_ID: u64 = 1;
    pub const BID_ROUNDS: usize = 15;
    pub const BID_AMOUNTS: [&str; 6] = ["60.0", "65.0", "55.0", "25.0", "35.0", "62.0"];
    pub const EPOCH_TICKS: usize = 15;

    // Validation limits
    pub const NETWORKS: [&str; 3] = ["emulator", "testnet", "mainnet"];
    pub const MAX_BIDDERS: usize = 64;
    pub const MAX_PACE_MS: u64 = 60_000;
    /// Ticks beyond the epoch count used when auto-fixing `epoch_ticks`
    pub const EPOCH_TICK_SLACK: usize = EPOCH_TICKS - EPOCH_COUNT as usize;
}

/// Driver configuration, from the command line or a JSON file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// File logging settings
    #[serde(default)]
    pub disable_file_logging: bool,

    #[serde(default)]
    pub disable_log_color: bool,

    #[serde(default = "default_filename_log")]
    pub filename_log: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    /// Tooling settings
    #[serde(default = "default_flow_binary")]
    pub flow_binary: String,

    #[serde(default = "default_project_dir")]
    pub project_dir: String,

    #[serde(default = "default_flow_config")]
    pub flow_config: String,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_service_account")]
    pub service_account: String,

    /// Demo parameters
    #[serde(default = "default_host_account")]
    pub host_account: String,

    #[serde(default = "default_bidder_count")]
    pub bidder_count: usize,

    #[serde(default = "default_nft_count")]
    pub nft_count: usize,

    #[serde(default = "default_minter_allowance")]
    pub minter_allowance: String,

    #[serde(default = "default_host_grant")]
    pub host_grant: String,

    #[serde(default = "default_bidder_grant")]
    pub bidder_grant: String,

    #[serde(default = "default_epoch_count")]
    pub epoch_count: u64,

    #[serde(default = "default_epoch_length")]
    pub epoch_length: u64,

    #[serde(default = "default_auction_id")]
    pub auction_id: u64,

    #[serde(default = "default_bid_rounds")]
    pub bid_rounds: usize,

    #[serde(default = "default_bid_amounts")]
    pub bid_amounts: Vec<String>,

    #[serde(default = "default_epoch_ticks")]
    pub epoch_ticks: usize,

    /// Pause before each phase, in milliseconds
    #[serde(default)]
    pub pace_ms: u64,

    /// Wait for ENTER at checkpoints
    #[serde(default)]
    pub interactive: bool,

    /// Auto-fix configuration issues
    #[serde(default = "default_auto_fix")]
    pub auto_fix_config: bool,

    /// Validation settings
    #[serde(default)]
    pub strict_validation: bool,
}

// Default functions for serde
fn default_log_level() -> LogLevel {
    defaults::LOG_LEVEL
}
fn default_filename_log() -> String {
    defaults::FILENAME_LOG.to_string()
}
fn default_logs_path() -> String {
    defaults::LOGS_PATH.to_string()
}
fn default_flow_binary() -> String {
    defaults::FLOW_BINARY.to_string()
}
fn default_project_dir() -> String {
    defaults::PROJECT_DIR.to_string()
}
fn default_flow_config() -> String {
    defaults::FLOW_CONFIG.to_string()
}
fn default_network() -> String {
    defaults::NETWORK.to_string()
}
fn default_service_account() -> String {
    defaults::SERVICE_ACCOUNT.to_string()
}
fn default_host_account() -> String {
    defaults::HOST_ACCOUNT.to_string()
}
fn default_bidder_count() -> usize {
    defaults::BIDDER_COUNT
}
fn default_nft_count() -> usize {
    defaults::NFT_COUNT
}
fn default_minter_allowance() -> String {
    defaults::MINTER_ALLOWANCE.to_string()
}
fn default_host_grant() -> String {
    defaults::HOST_GRANT.to_string()
}
fn default_bidder_grant() -> String {
    defaults::BIDDER_GRANT.to_string()
}
fn default_epoch_count() -> u64 {
    defaults::EPOCH_COUNT
}
fn default_epoch_length() -> u64 {
    defaults::EPOCH_LENGTH
}
fn default_auction_id() -> u64 {
    defaults::AUCTION_ID
}
fn default_bid_rounds() -> usize {
    defaults::BID_ROUNDS
}
fn default_bid_amounts() -> Vec<String> {
    defaults::BID_AMOUNTS.iter().map(ToString::to_string).collect()
}
fn default_epoch_ticks() -> usize {
    defaults::EPOCH_TICKS
}
fn default_auto_fix() -> bool {
    true
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            disable_file_logging: false,
            disable_log_color: false,
            filename_log: default_filename_log(),
            logs_path: default_logs_path(),
            flow_binary: default_flow_binary(),
            project_dir: default_project_dir(),
            flow_config: default_flow_config(),
            network: default_network(),
            service_account: default_service_account(),
            host_account: default_host_account(),
            bidder_count: default_bidder_count(),
            nft_count: default_nft_count(),
            minter_allowance: default_minter_allowance(),
            host_grant: default_host_grant(),
            bidder_grant: default_bidder_grant(),
            epoch_count: default_epoch_count(),
            epoch_length: default_epoch_length(),
            auction_id: default_auction_id(),
            bid_rounds: default_bid_rounds(),
            bid_amounts: default_bid_amounts(),
            epoch_ticks: default_epoch_ticks(),
            pace_ms: 0,
            interactive: false,
            auto_fix_config: default_auto_fix(),
            strict_validation: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidNetwork(String),
    OutOfRange {
        field: String,
        value: u64,
        min: u64,
        max: u64,
    },
    InvalidAmount {
        field: String,
        value: String,
        reason: String,
    },
    BidAmountsMismatch {
        bidders: usize,
        amounts: usize,
    },
    InsufficientEpochTicks {
        ticks: usize,
        epochs: u64,
    },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidNetwork(network) => write!(
                f,
                "Invalid network: '{}' - must be one of: {}",
                network,
                defaults::NETWORKS.join(", ")
            ),
            ConfigValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Invalid {}: {} - must be between {} and {}",
                field, value, min, max
            ),
            ConfigValidationError::InvalidAmount {
                field,
                value,
                reason,
            } => write!(f, "Invalid {}: '{}' - {}", field, value, reason),
            ConfigValidationError::BidAmountsMismatch { bidders, amounts } => write!(
                f,
                "Bid amounts mismatch: {} amount(s) for {} bidder(s)",
                amounts, bidders
            ),
            ConfigValidationError::InsufficientEpochTicks { ticks, epochs } => write!(
                f,
                "Invalid epoch_ticks: {} ticks cannot finish an auction of {} epochs",
                ticks, epochs
            ),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validation result
pub type ValidationResult<T> = std::result::Result<T, ConfigValidationError>;

/// Configuration validator
pub struct ConfigValidator {
    strict_mode: bool,
    auto_fix: bool,
}

impl ConfigValidator {
    pub fn new(strict_mode: bool, auto_fix: bool) -> Self {
        Self {
            strict_mode,
            auto_fix,
        }
    }

    /// Validate the entire configuration, returning the fixes and warnings
    pub fn validate(&self, config: &mut DriverConfig) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut fixed_issues = Vec::new();

        info!("🔍 Validating configuration...");

        if let Err(e) = Self::validate_network(&config.network) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.network = defaults::NETWORK.to_string();
                format!("Fixed network to default: {}", config.network)
            })?;
        }

        if let Err(e) = Self::validate_range(
            "bidder_count",
            config.bidder_count as u64,
            1,
            defaults::MAX_BIDDERS as u64,
        ) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.bidder_count = defaults::BIDDER_COUNT;
                format!("Fixed bidder_count to {}", config.bidder_count)
            })?;
        }

        for (field, value, default) in [
            ("nft_count", &mut config.nft_count, defaults::NFT_COUNT),
            ("bid_rounds", &mut config.bid_rounds, defaults::BID_ROUNDS),
        ] {
            if let Err(e) = Self::validate_range(field, *value as u64, 1, u64::MAX) {
                self.fix_or_fail(e, &mut fixed_issues, || {
                    *value = default;
                    format!("Fixed {} to {}", field, default)
                })?;
            }
        }

        for (field, value, default) in [
            ("epoch_count", &mut config.epoch_count, defaults::EPOCH_COUNT),
            ("epoch_length", &mut config.epoch_length, defaults::EPOCH_LENGTH),
        ] {
            if let Err(e) = Self::validate_range(field, *value, 1, u64::MAX) {
                self.fix_or_fail(e, &mut fixed_issues, || {
                    *value = default;
                    format!("Fixed {} to {}", field, default)
                })?;
            }
        }

        for (field, value, default) in [
            (
                "minter_allowance",
                &mut config.minter_allowance,
                defaults::MINTER_ALLOWANCE,
            ),
            ("host_grant", &mut config.host_grant, defaults::HOST_GRANT),
            ("bidder_grant", &mut config.bidder_grant, defaults::BIDDER_GRANT),
        ] {
            if let Err(e) = Self::validate_amount(field, value) {
                self.fix_or_fail(e, &mut fixed_issues, || {
                    *value = default.to_string();
                    format!("Fixed {} to {}", field, default)
                })?;
            }
        }

        let invalid_bid = config
            .bid_amounts
            .iter()
            .find_map(|amount| Self::validate_amount("bid_amounts", amount).err());
        if let Some(e) = invalid_bid {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.bid_amounts = default_bid_amounts();
                "Fixed bid_amounts to defaults".to_string()
            })?;
        }

        if config.bid_amounts.len() != config.bidder_count {
            let e = ConfigValidationError::BidAmountsMismatch {
                bidders: config.bidder_count,
                amounts: config.bid_amounts.len(),
            };
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.bid_amounts = Self::cycle_amounts(&config.bid_amounts, config.bidder_count);
                format!("Fitted bid_amounts to {} bidders", config.bidder_count)
            })?;
        }

        if (config.epoch_ticks as u64) < config.epoch_count {
            let e = ConfigValidationError::InsufficientEpochTicks {
                ticks: config.epoch_ticks,
                epochs: config.epoch_count,
            };
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.epoch_ticks = config.epoch_count as usize + defaults::EPOCH_TICK_SLACK;
                format!("Fixed epoch_ticks to {}", config.epoch_ticks)
            })?;
        }

        if let Err(e) = Self::validate_range("pace_ms", config.pace_ms, 0, defaults::MAX_PACE_MS) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.pace_ms = 0;
                "Disabled pacing".to_string()
            })?;
        }

        self.validate_paths(config, &mut warnings, &mut fixed_issues)?;

        if !fixed_issues.is_empty() {
            info!(
                "🔧 Auto-fixed {} configuration issue(s):",
                fixed_issues.len()
            );
            for fix in &fixed_issues {
                info!("  ✅ {}", fix);
            }
        }

        if !warnings.is_empty() {
            warn!("⚠️  Configuration warnings:");
            for warning in &warnings {
                warn!("  • {}", warning);
            }
        }

        let mut all_messages = fixed_issues;
        all_messages.extend(warnings);

        info!("✅ Configuration validation completed successfully");
        Ok(all_messages)
    }

    fn fix_or_fail(
        &self,
        error: ConfigValidationError,
        fixed_issues: &mut Vec<String>,
        fix: impl FnOnce() -> String,
    ) -> Result<()> {
        if self.auto_fix && !self.strict_mode {
            warn!("Auto-fixing configuration: {}", error);
            fixed_issues.push(fix());
            Ok(())
        } else {
            Err(anyhow!("Configuration validation failed: {}", error))
        }
    }

    fn validate_network(network: &str) -> ValidationResult<()> {
        if defaults::NETWORKS.contains(&network.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ConfigValidationError::InvalidNetwork(network.to_string()))
        }
    }

    fn validate_range(field: &str, value: u64, min: u64, max: u64) -> ValidationResult<()> {
        if value < min || value > max {
            return Err(ConfigValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    fn validate_amount(field: &str, value: &str) -> ValidationResult<()> {
        value
            .parse::<UFix64>()
            .map(|_| ())
            .map_err(|e| ConfigValidationError::InvalidAmount {
                field: field.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Repeat (or cut) `amounts` to `count` entries; an empty list takes the defaults
    fn cycle_amounts(amounts: &[String], count: usize) -> Vec<String> {
        let source = if amounts.is_empty() {
            default_bid_amounts()
        } else {
            amounts.to_vec()
        };
        source.iter().cycle().take(count).cloned().collect()
    }

    fn validate_paths(
        &self,
        config: &DriverConfig,
        warnings: &mut Vec<String>,
        fixed_issues: &mut Vec<String>,
    ) -> Result<()> {
        if !config.disable_file_logging {
            self.ensure_directory_exists(&config.logs_path, "logs", fixed_issues)?;

            let log_path = Path::new(&config.logs_path).join(&config.filename_log);
            if log_path.exists() && log_path.metadata()?.len() > 0 {
                warnings.push(format!(
                    "Log file '{}' already exists and is not empty - logs will be appended",
                    log_path.display()
                ));
            }
        }

        let project_file = Path::new(&config.project_dir).join(&config.flow_config);
        if !project_file.is_file() {
            warnings.push(format!(
                "Flow project file '{}' not found - only --dry-run and --print-plan will work",
                project_file.display()
            ));
        }

        Ok(())
    }

    fn ensure_directory_exists(
        &self,
        path: &str,
        dir_type: &str,
        fixed_issues: &mut Vec<String>,
    ) -> Result<()> {
        let path_buf = PathBuf::from(path);

        if !path_buf.exists() {
            info!("Creating {} directory: {}", dir_type, path);
            std::fs::create_dir_all(&path_buf).map_err(|e| {
                anyhow!("Failed to create {} directory '{}': {}", dir_type, path, e)
            })?;
            fixed_issues.push(format!("Created {} directory: {}", dir_type, path));
        } else if !path_buf.is_dir() {
            return Err(anyhow!("Path '{}' exists but is not a directory", path));
        }

        Ok(())
    }
}

fn parse_amount(field: &str, value: &str) -> Result<UFix64> {
    value
        .parse()
        .with_context(|| format!("Invalid {} '{}'", field, value))
}

impl DriverConfig {
    /// Demo parameters for the orbital plan
    pub fn to_demo_params(&self) -> Result<DemoParams> {
        let bid_amounts = self
            .bid_amounts
            .iter()
            .map(|amount| parse_amount("bid amount", amount))
            .collect::<Result<Vec<_>>>()?;

        Ok(DemoParams {
            host: self.host_account.clone(),
            bidder_count: self.bidder_count,
            nft_count: self.nft_count,
            minter_allowance: parse_amount("minter_allowance", &self.minter_allowance)?,
            host_grant: parse_amount("host_grant", &self.host_grant)?,
            bidder_grant: parse_amount("bidder_grant", &self.bidder_grant)?,
            epoch_count: self.epoch_count,
            epoch_length: self.epoch_length,
            auction_id: self.auction_id,
            bid_rounds: self.bid_rounds,
            bid_amounts,
            epoch_ticks: self.epoch_ticks,
            ..DemoParams::default()
        })
    }

    pub fn to_flow_cli_config(&self) -> FlowCliConfig {
        FlowCliConfig {
            binary: PathBuf::from(&self.flow_binary),
            project_dir: PathBuf::from(&self.project_dir),
            flow_config: PathBuf::from(&self.flow_config),
            network: self.network.to_lowercase(),
            service_account: self.service_account.clone(),
            ..FlowCliConfig::default()
        }
    }

    /// Pacing on the system clock
    pub fn to_pacing(&self) -> Pacing {
        Pacing::immediate()
            .with_phase_delay(Duration::from_millis(self.pace_ms))
            .interactive(self.interactive)
    }

    pub fn logger_config(&self) -> LoggerConfig<'_> {
        LoggerConfig {
            level: self.log_level,
            dir_path: &self.logs_path,
            filename_log: &self.filename_log,
            disable_file_logging: self.disable_file_logging,
            disable_colors: self.disable_log_color,
        }
    }

    /// Validate and load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P, strict_mode: bool, auto_fix: bool) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            anyhow!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let mut config: DriverConfig = serde_json::from_str(&content).map_err(|e| {
            anyhow!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let validator = ConfigValidator::new(strict_mode, auto_fix);
        let messages = validator.validate(&mut config)?;

        if !messages.is_empty() {
            info!(
                "Configuration loaded with {} adjustments/warnings",
                messages.len()
            );
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        info!("Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Write the default configuration with a descriptive `_info` header
    pub fn generate_template<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut template = serde_json::to_value(DriverConfig::default())?;
        if let Value::Object(fields) = &mut template {
            fields.insert(
                "_info".to_string(),
                json!({
                    "description": "Orbital Auction demo driver configuration",
                    "version": "1.0",
                    "sections": {
                        "logging": "Controls log output and file generation",
                        "tooling": "Location of the flow binary and the Cadence project",
                        "demo": "Accounts, amounts and counts of the orbital walkthrough",
                        "pacing": "Delays between phases and interactive checkpoints",
                        "validation": "Configuration validation behavior"
                    }
                }),
            );
        }

        std::fs::write(&path, serde_json::to_string_pretty(&template)?).map_err(|e| {
            anyhow!(
                "Failed to write template to '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        info!(
            "Configuration template generated at: {}",
            path.as_ref().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> DriverConfig {
        DriverConfig {
            logs_path: dir.path().join("logs").display().to_string(),
            project_dir: dir.path().display().to_string(),
            ..DriverConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        let original = config.clone();

        let messages = ConfigValidator::new(true, false).validate(&mut config).unwrap();

        assert_eq!(config, original);
        assert!(dir.path().join("logs").is_dir());
        // flow.json is missing from the temp project
        assert!(messages.iter().any(|m| m.contains("flow.json")));
    }

    #[test]
    fn test_auto_fix() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DriverConfig {
            network: "devnet".to_string(),
            epoch_count: 20,
            epoch_ticks: 3,
            bidder_count: 4,
            pace_ms: 120_000,
            host_grant: "-5".to_string(),
            ..config_in(&dir)
        };

        let messages = ConfigValidator::new(false, true).validate(&mut config).unwrap();

        assert_eq!(config.network, "emulator");
        assert_eq!(config.epoch_ticks, 27);
        assert_eq!(config.bid_amounts, vec!["60.0", "65.0", "55.0", "25.0"]);
        assert_eq!(config.pace_ms, 0);
        assert_eq!(config.host_grant, defaults::HOST_GRANT);
        assert!(messages.len() >= 5);
    }

    #[test]
    fn test_cycle_bid_amounts() {
        let amounts = vec!["1.0".to_string(), "2.0".to_string()];
        assert_eq!(
            ConfigValidator::cycle_amounts(&amounts, 5),
            vec!["1.0", "2.0", "1.0", "2.0", "1.0"]
        );
        assert_eq!(ConfigValidator::cycle_amounts(&[], 2), vec!["60.0", "65.0"]);
    }

    #[test]
    fn test_strict_mode_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DriverConfig {
            bidder_count: 0,
            ..config_in(&dir)
        };
        let err = ConfigValidator::new(true, true)
            .validate(&mut config)
            .unwrap_err();
        assert!(err.to_string().contains("bidder_count"));

        let mut config = DriverConfig {
            bid_amounts: vec!["60.0".to_string()],
            ..config_in(&dir)
        };
        assert!(ConfigValidator::new(false, false).validate(&mut config).is_err());
    }

    #[test]
    fn test_demo_params_from_defaults() {
        let params = DriverConfig::default().to_demo_params().unwrap();
        assert_eq!(params, DemoParams::default());

        let broken = DriverConfig {
            bid_amounts: vec!["sixty".to_string()],
            ..DriverConfig::default()
        };
        assert!(broken.to_demo_params().is_err());
    }

    #[test]
    fn test_tooling_and_pacing() {
        let config = DriverConfig {
            network: "Testnet".to_string(),
            pace_ms: 250,
            interactive: true,
            ..DriverConfig::default()
        };

        let flow = config.to_flow_cli_config();
        assert_eq!(flow.network, "testnet");
        assert_eq!(flow.binary, PathBuf::from("flow"));

        let pacing = config.to_pacing();
        assert_eq!(pacing.phase_delay, Duration::from_millis(250));
        assert!(pacing.interactive);
    }

    #[test]
    fn test_file_round_trip_and_template() {
        let dir = tempfile::tempdir().unwrap();

        let saved = DriverConfig {
            bidder_count: 2,
            bid_amounts: vec!["1.5".to_string(), "2.5".to_string()],
            ..config_in(&dir)
        };
        let path = dir.path().join("driver.json");
        saved.save_to_file(&path).unwrap();
        let loaded = DriverConfig::from_file(&path, true, false).unwrap();
        assert_eq!(loaded, saved);

        let template = dir.path().join("template.json");
        DriverConfig::generate_template(&template).unwrap();
        let content: Value =
            serde_json::from_str(&std::fs::read_to_string(&template).unwrap()).unwrap();
        assert!(content.get("_info").is_some());
        assert_eq!(content["network"], json!("emulator"));

        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{ "bidder_count": 3, "auto_fix_config": true }"#).unwrap();
        let config: DriverConfig =
            serde_json::from_str(&std::fs::read_to_string(&partial).unwrap()).unwrap();
        assert_eq!(config.bidder_count, 3);
        assert_eq!(config.nft_count, defaults::NFT_COUNT);
    }
}
