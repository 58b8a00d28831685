use super::{FlowTooling, ScriptOutput, ToolingError, TransactionReceipt, TransactionStatus};
use crate::cadence::{encode_arguments, Address, Argument, CadenceValue};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, OnceCell};

/// Captured result of one external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns external commands; swapped out in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String], cwd: &Path)
        -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes and waits for them to exit
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
    ) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Where the `flow` binary and the Cadence project live
#[derive(Debug, Clone)]
pub struct FlowCliConfig {
    pub binary: PathBuf,
    /// Directory holding `flow.json` and the Cadence sources
    pub project_dir: PathBuf,
    /// Project file, relative to `project_dir`
    pub flow_config: PathBuf,
    pub network: String,
    /// Account that pays for and keys newly created accounts
    pub service_account: String,
    pub contracts_dir: String,
    pub transactions_dir: String,
    pub scripts_dir: String,
}

impl Default for FlowCliConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("flow"),
            project_dir: PathBuf::from("."),
            flow_config: PathBuf::from("flow.json"),
            network: "emulator".to_string(),
            service_account: "emulator-account".to_string(),
            contracts_dir: "./contracts".to_string(),
            transactions_dir: "./transactions".to_string(),
            scripts_dir: "./scripts".to_string(),
        }
    }
}

/// [`FlowTooling`] on top of the `flow` command line client.
///
/// Account names are looked up in the `accounts` table of `flow.json`,
/// first as `<network>-<name>` and then as `<name>`. Accounts created at
/// runtime are written back under `<network>-<name>` with the service
/// account's key so later transactions can be signed by them.
pub struct FlowCli<R: CommandRunner = ProcessRunner> {
    config: FlowCliConfig,
    runner: R,
    created: Mutex<HashMap<String, Address>>,
    service_public_key: OnceCell<String>,
}

impl FlowCli<ProcessRunner> {
    pub fn new(config: FlowCliConfig) -> Self {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R: CommandRunner> FlowCli<R> {
    pub fn with_runner(config: FlowCliConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            created: Mutex::new(HashMap::new()),
            service_public_key: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &FlowCliConfig {
        &self.config
    }

    fn project_path(&self) -> PathBuf {
        self.config.project_dir.join(&self.config.flow_config)
    }

    fn network_account_name(&self, account: &str) -> String {
        format!("{}-{}", self.config.network, account)
    }

    fn project_error(&self, reason: impl Into<String>) -> ToolingError {
        ToolingError::Project {
            path: self.project_path().display().to_string(),
            reason: reason.into(),
        }
    }

    async fn load_project(&self) -> Result<Value, ToolingError> {
        let content = tokio::fs::read_to_string(self.project_path())
            .await
            .map_err(|e| self.project_error(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| self.project_error(e.to_string()))
    }

    async fn save_project(&self, project: &Value) -> Result<(), ToolingError> {
        let content =
            serde_json::to_string_pretty(project).map_err(|e| self.project_error(e.to_string()))?;

        tokio::fs::write(self.project_path(), content)
            .await
            .map_err(|e| self.project_error(e.to_string()))
    }

    fn resolve_account_entry<'a>(
        &self,
        project: &'a Value,
        account: &str,
    ) -> Option<(String, &'a Value)> {
        let accounts = project.get("accounts")?.as_object()?;
        [self.network_account_name(account), account.to_string()]
            .into_iter()
            .find_map(|candidate| accounts.get(&candidate).map(|entry| (candidate, entry)))
    }

    async fn signer_name(&self, account: &str) -> Result<String, ToolingError> {
        let project = self.load_project().await?;
        self.resolve_account_entry(&project, account)
            .map(|(name, _)| name)
            .ok_or_else(|| ToolingError::UnknownAccount(account.to_string()))
    }

    fn common_flags(&self) -> Vec<String> {
        vec![
            "--network".to_string(),
            self.config.network.clone(),
            "-f".to_string(),
            self.config.flow_config.display().to_string(),
            "-o".to_string(),
            "json".to_string(),
        ]
    }

    async fn invoke(&self, mut args: Vec<String>) -> Result<String, ToolingError> {
        args.extend(self.common_flags());
        let command = format!("{} {}", self.config.binary.display(), args.join(" "));
        debug!("Running {}", command);

        let output = self
            .runner
            .run(&self.config.binary, &args, &self.config.project_dir)
            .await
            .map_err(|source| ToolingError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.success {
            let stderr = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(ToolingError::CommandFailed {
                command,
                code: output
                    .code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: stderr.to_string(),
            });
        }

        Ok(output.stdout)
    }

    async fn service_public_key(&self) -> Result<&str, ToolingError> {
        self.service_public_key
            .get_or_try_init(|| async {
                let project = self.load_project().await?;
                let service = &self.config.service_account;
                let (_, entry) = self
                    .resolve_account_entry(&project, service)
                    .ok_or_else(|| ToolingError::UnknownAccount(service.clone()))?;
                let private_key = private_key_of(entry).ok_or_else(|| {
                    self.project_error(format!("account '{}' has no private key", service))
                })?;

                let stdout = self
                    .invoke(vec![
                        "keys".to_string(),
                        "derive".to_string(),
                        private_key.to_string(),
                    ])
                    .await?;
                let parsed = parse_json("flow keys derive", &stdout)?;

                parsed
                    .get("public")
                    .or_else(|| parsed.get("publicKey"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| ToolingError::MalformedOutput {
                        command: "flow keys derive".to_string(),
                        reason: "no public key in output".to_string(),
                    })
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl<R: CommandRunner> FlowTooling for FlowCli<R> {
    async fn deploy_contract(&self, contract: &str) -> Result<(), ToolingError> {
        let signer = self.signer_name(contract).await?;
        let source = format!("{}/{}.cdc", self.config.contracts_dir, contract);

        self.invoke(vec![
            "accounts".to_string(),
            "add-contract".to_string(),
            contract.to_string(),
            source,
            "--signer".to_string(),
            signer.clone(),
        ])
        .await
        .map_err(|e| match e {
            ToolingError::CommandFailed { stderr, .. } => ToolingError::DeploymentFailed {
                contract: contract.to_string(),
                reason: stderr,
            },
            other => other,
        })?;

        info!("Deployed contract {} with signer {}", contract, signer);
        Ok(())
    }

    async fn create_account(&self, account: &str) -> Result<Address, ToolingError> {
        let mut project = self.load_project().await?;
        if self.resolve_account_entry(&project, account).is_some() {
            return Err(ToolingError::AccountExists(account.to_string()));
        }

        let service_key = self
            .resolve_account_entry(&project, &self.config.service_account)
            .and_then(|(_, entry)| entry.get("key").or_else(|| entry.get("keys")).cloned())
            .ok_or_else(|| ToolingError::UnknownAccount(self.config.service_account.clone()))?;
        let public_key = self.service_public_key().await?.to_string();

        let stdout = self
            .invoke(vec![
                "accounts".to_string(),
                "create".to_string(),
                "--key".to_string(),
                public_key,
                "--signer".to_string(),
                self.config.service_account.clone(),
            ])
            .await?;
        let parsed = parse_json("flow accounts create", &stdout)?;
        let address: Address = parsed
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolingError::MalformedOutput {
                command: "flow accounts create".to_string(),
                reason: "no address in output".to_string(),
            })?
            .parse()?;

        let accounts = project
            .get_mut("accounts")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| self.project_error("missing 'accounts' table"))?;
        accounts.insert(
            self.network_account_name(account),
            json!({ "address": address.to_hex(), "key": service_key }),
        );
        self.save_project(&project).await?;

        self.created.lock().await.insert(account.to_string(), address);
        info!("Created account {} at {}", account, address);
        Ok(address)
    }

    async fn find_address(&self, account: &str) -> Result<Address, ToolingError> {
        if let Some(address) = self.created.lock().await.get(account).copied() {
            return Ok(address);
        }

        let project = self.load_project().await?;
        let (_, entry) = self
            .resolve_account_entry(&project, account)
            .ok_or_else(|| ToolingError::UnknownAccount(account.to_string()))?;
        let text = entry
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| self.project_error(format!("account '{}' has no address", account)))?;

        Ok(text.parse()?)
    }

    async fn send_transaction_with_arguments(
        &self,
        name: &str,
        signer: &str,
        args: &[Argument],
    ) -> Result<TransactionReceipt, ToolingError> {
        let signer_entry = self.signer_name(signer).await?;
        let mut command = vec![
            "transactions".to_string(),
            "send".to_string(),
            format!("{}/{}.cdc", self.config.transactions_dir, name),
            "--signer".to_string(),
            signer_entry,
        ];
        if !args.is_empty() {
            command.push("--args-json".to_string());
            command.push(encode_arguments(args));
        }

        let failed = |reason: String| ToolingError::TransactionFailed {
            name: name.to_string(),
            signer: signer.to_string(),
            reason,
        };

        let stdout = self.invoke(command).await.map_err(|e| match e {
            ToolingError::CommandFailed { stderr, .. } => failed(stderr),
            other => other,
        })?;
        let receipt = parse_receipt(&format!("flow transactions send {}", name), &stdout)?;

        if let Some(error) = &receipt.error {
            return Err(failed(error.clone()));
        }
        if receipt.status != TransactionStatus::Sealed {
            return Err(failed(format!(
                "transaction {} finished as {}",
                receipt.id, receipt.status
            )));
        }

        debug!("Transaction {} sealed as {}", name, receipt.id);
        Ok(receipt)
    }

    async fn run_script(
        &self,
        name: &str,
        args: &[Argument],
    ) -> Result<ScriptOutput, ToolingError> {
        let mut command = vec![
            "scripts".to_string(),
            "execute".to_string(),
            format!("{}/{}.cdc", self.config.scripts_dir, name),
        ];
        if !args.is_empty() {
            command.push("--args-json".to_string());
            command.push(encode_arguments(args));
        }

        let stdout = self.invoke(command).await.map_err(|e| match e {
            ToolingError::CommandFailed { stderr, .. } => ToolingError::ScriptFailed {
                name: name.to_string(),
                reason: stderr,
            },
            other => other,
        })?;

        Ok(parse_script_output(&stdout))
    }
}

fn private_key_of(entry: &Value) -> Option<&str> {
    let key = entry.get("key").or_else(|| entry.get("keys"))?;
    key.as_str()
        .or_else(|| key.get("privateKey").and_then(Value::as_str))
}

fn parse_json(command: &str, stdout: &str) -> Result<Value, ToolingError> {
    serde_json::from_str(stdout.trim()).map_err(|e| ToolingError::MalformedOutput {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// Read a `flow transactions send -o json` result
pub fn parse_receipt(command: &str, stdout: &str) -> Result<TransactionReceipt, ToolingError> {
    let parsed = parse_json(command, stdout)?;

    let id = parsed
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolingError::MalformedOutput {
            command: command.to_string(),
            reason: "missing transaction id".to_string(),
        })?
        .to_string();

    let status = parsed
        .get("status")
        .map(TransactionStatus::from_json)
        .unwrap_or(TransactionStatus::Unknown);

    let error = parsed
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|error| !error.is_empty())
        .map(str::to_string);

    let events = parsed
        .get("events")
        .and_then(Value::as_array)
        .map(|events| {
            events
                .iter()
                .filter_map(|event| event.get("type").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(TransactionReceipt {
        id,
        status,
        error,
        events,
    })
}

/// Read a `flow scripts execute -o json` result.
///
/// Depending on the CLI version the JSON-Cadence value is printed bare,
/// wrapped as `{"value": {...}}`, or wrapped as a JSON string. Anything
/// else is kept as raw text.
pub fn parse_script_output(stdout: &str) -> ScriptOutput {
    let raw = stdout.trim().to_string();

    let value = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|parsed| {
            if parsed.get("type").is_some() {
                return CadenceValue::from_json(&parsed).ok();
            }
            let inner = parsed.get("value")?;
            match inner {
                Value::Object(_) => CadenceValue::from_json(inner).ok(),
                Value::String(text) => CadenceValue::parse(text).ok(),
                _ => None,
            }
        });

    ScriptOutput { raw, value }
}
