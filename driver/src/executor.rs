//! Plan execution engine
//!
//! Runs a validated [`Plan`] against a [`FlowTooling`] backend, strictly in
//! order and with one call in flight at a time. Setup and action failures
//! abort the run with a [`DriverError`]; settlement mismatches are collected
//! into the [`ExecutionReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use orbital_driver::executor::Executor;
//! use orbital_driver::plan::{orbital_plan, DemoParams};
//! use orbital_driver::tooling::RecordingTooling;
//! use std::sync::Arc;
//!
//! let plan = orbital_plan(&DemoParams::default())?;
//! let mut executor = Executor::new(Arc::new(RecordingTooling::new()));
//! let report = executor.execute(&plan).await?;
//!
//! assert_eq!(report.transactions_sent, 140);
//! ```

use crate::cadence::{Address, Argument};
use crate::orchestrator::Pacing;
use crate::plan::{Phase, Plan, PlanArg, PlanError, PlannedStep, Step};
use crate::tooling::{FlowTooling, ScriptOutput, ToolingError, TransactionReceipt, TransactionStatus};
use crate::verification::{evaluate_settlement, extract_balance, Finding, SettlementCheck};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Tooling(#[from] ToolingError),

    #[error("transaction {id} ended as {status}{}", .error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default())]
    NotSealed {
        id: String,
        status: TransactionStatus,
        error: Option<String>,
    },

    #[error("failed to wait for confirmation: {0}")]
    Prompt(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("step {index} ({phase}) '{step}' failed: {source}")]
    Step {
        index: usize,
        phase: Phase,
        step: String,
        #[source]
        source: StepError,
    },
}

/// Plan executor
pub struct Executor {
    tooling: Arc<dyn FlowTooling>,

    pacing: Pacing,

    /// Resolved addresses (name → address)
    addresses: HashMap<String, Address>,

    /// Execution log
    log: Vec<String>,

    /// Current step number (1-indexed)
    current_step: usize,

    /// Source of checkpoint confirmations; stdin once first needed
    checkpoint_input: Option<Box<dyn AsyncBufRead + Unpin + Send>>,
}

impl Executor {
    pub fn new(tooling: Arc<dyn FlowTooling>) -> Self {
        Self {
            tooling,
            pacing: Pacing::immediate(),
            addresses: HashMap::new(),
            log: Vec::new(),
            current_step: 0,
            checkpoint_input: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Read checkpoint confirmations from `input` instead of stdin
    pub fn with_checkpoint_input<R>(mut self, input: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.checkpoint_input = Some(Box::new(input));
        self
    }

    /// Execute a complete plan
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The plan fails validation
    /// - Any deployment, account creation, transaction or script fails
    /// - A transaction is not sealed cleanly
    pub async fn execute(&mut self, plan: &Plan) -> Result<ExecutionReport, DriverError> {
        plan.validate()?;

        self.log.clear();
        self.addresses.clear();
        self.current_step = 0;

        let mut report = ExecutionReport::new(&plan.name);
        self.log(format!("Starting plan: {}", plan.name));
        if let Some(description) = &plan.description {
            self.log(format!("Description: {}", description));
        }

        let mut current_phase = None;
        for (position, planned) in plan.steps.iter().enumerate() {
            self.current_step = position + 1;

            if current_phase != Some(planned.phase) {
                if current_phase.is_some() {
                    self.pacing.pause_between_phases().await;
                }
                current_phase = Some(planned.phase);
                self.phase_banner(planned.phase);
            }

            debug!("Step {}: {}", self.current_step, planned.step);
            self.execute_step(planned, &mut report)
                .await
                .map_err(|source| DriverError::Step {
                    index: self.current_step,
                    phase: planned.phase,
                    step: planned.step.to_string(),
                    source,
                })?;
        }

        if report.findings.is_empty() {
            self.log("=== Plan completed successfully ===".to_string());
        } else {
            self.log(format!(
                "=== Plan completed with {} finding(s) ===",
                report.findings.len()
            ));
        }

        report.steps_executed = self.current_step;
        report.log = self.log.clone();
        Ok(report)
    }

    async fn execute_step(
        &mut self,
        planned: &PlannedStep,
        report: &mut ExecutionReport,
    ) -> Result<(), StepError> {
        match &planned.step {
            Step::Deploy { contract } => {
                self.tooling.deploy_contract(contract).await?;
                self.log(format!("Deployed {}", contract));
            }
            Step::CreateAccount { account } => {
                let address = self.tooling.create_account(account).await?;
                self.addresses.insert(account.clone(), address);
                self.log(format!("Created {} at {}", account, address));
            }
            Step::Provision { account, container } => {
                let receipt = self
                    .tooling
                    .send_transaction(container.setup_transaction(), account)
                    .await?;
                Self::ensure_sealed(&receipt)?;
                report.record_transaction(planned.phase);
                self.log(format!("Set up {} for {}", container, account));
            }
            Step::Transaction {
                name, signer, args, ..
            } => {
                let args = self.resolve_args(args).await?;
                let receipt = self
                    .tooling
                    .send_transaction_with_arguments(name, signer, &args)
                    .await?;
                Self::ensure_sealed(&receipt)?;
                report.record_transaction(planned.phase);
                self.log(format!("{} signed by {} sealed as {}", name, signer, receipt.id));
            }
            Step::Script { name, args } => {
                let resolved = self.resolve_args(args).await?;
                let output = self.tooling.run_script(name, &resolved).await?;
                info!("{}: {}", name, output);
                self.log(format!("{} => {}", name, output));
                report.record_script(self.current_step, name, &resolved, output);
            }
            Step::Narrate { message } => {
                info!("{}", message);
                self.log(message.clone());
            }
            Step::Checkpoint { message } => {
                if self.pacing.interactive {
                    info!("{}", message);
                    self.wait_for_enter().await?;
                } else {
                    debug!("Checkpoint '{}' skipped in non-interactive mode", message);
                }
                self.log(format!("Checkpoint: {}", message));
            }
            Step::VerifySettlement(check) => {
                let findings = self.verify_settlement(check, report).await?;
                for finding in &findings {
                    warn!("Settlement finding: {}", finding);
                    self.log(format!("FINDING: {}", finding));
                }
                if findings.is_empty() {
                    info!("Settlement verified for {} bidders", check.bidders.len());
                    self.log("Settlement verified".to_string());
                }
                report.findings.extend(findings);
            }
        }
        Ok(())
    }

    async fn verify_settlement(
        &mut self,
        check: &SettlementCheck,
        report: &mut ExecutionReport,
    ) -> Result<Vec<Finding>, StepError> {
        let mut balances = Vec::with_capacity(check.bidders.len());
        for bidder in &check.bidders {
            let address = self.resolve_address(bidder).await?;
            let args = [Argument::Address(address)];
            let output = self.tooling.run_script(&check.balance_script, &args).await?;
            let balance = extract_balance(&output);
            debug!("Balance of {}: {:?}", bidder, balance.map(|b| b.to_string()));
            report.record_script(self.current_step, &check.balance_script, &args, output);
            balances.push(balance);
        }
        Ok(evaluate_settlement(check, &balances))
    }

    async fn resolve_address(&mut self, account: &str) -> Result<Address, ToolingError> {
        if let Some(address) = self.addresses.get(account) {
            return Ok(*address);
        }
        let address = self.tooling.find_address(account).await?;
        self.addresses.insert(account.to_string(), address);
        Ok(address)
    }

    async fn resolve_args(&mut self, args: &[PlanArg]) -> Result<Vec<Argument>, ToolingError> {
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            resolved.push(match arg {
                PlanArg::AddressOf(account) => Argument::Address(self.resolve_address(account).await?),
                PlanArg::Value(value) => value.clone(),
            });
        }
        Ok(resolved)
    }

    fn ensure_sealed(receipt: &TransactionReceipt) -> Result<(), StepError> {
        if receipt.is_success() {
            return Ok(());
        }
        Err(StepError::NotSealed {
            id: receipt.id.clone(),
            status: receipt.status,
            error: receipt.error.clone(),
        })
    }

    async fn wait_for_enter(&mut self) -> Result<(), StepError> {
        let input = self
            .checkpoint_input
            .get_or_insert_with(|| Box::new(BufReader::new(tokio::io::stdin())));

        let mut line = String::new();
        input.read_line(&mut line).await.map_err(StepError::Prompt)?;
        Ok(())
    }

    fn phase_banner(&mut self, phase: Phase) {
        info!("=== {} ===", phase.title());
        self.log(format!("\n--- Phase: {} ---", phase.title()));
    }

    fn log(&mut self, message: String) {
        self.log.push(message);
    }

    pub fn get_log(&self) -> &[String] {
        &self.log
    }
}

/// A script call and what it printed
#[derive(Debug, Clone)]
pub struct ScriptRecord {
    /// Plan step that ran the script
    pub step: usize,
    pub name: String,
    pub args: Vec<Argument>,
    pub output: ScriptOutput,
}

/// Execution report
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub plan_name: String,

    /// Number of steps executed
    pub steps_executed: usize,

    pub transactions_sent: usize,

    pub scripts_run: usize,

    /// Transactions per phase, in phase order of first appearance
    pub transactions_by_phase: IndexMap<Phase, usize>,

    pub script_outputs: Vec<ScriptRecord>,

    /// Settlement mismatches
    pub findings: Vec<Finding>,

    /// Execution log
    pub log: Vec<String>,
}

impl ExecutionReport {
    fn new(plan_name: &str) -> Self {
        Self {
            plan_name: plan_name.to_string(),
            steps_executed: 0,
            transactions_sent: 0,
            scripts_run: 0,
            transactions_by_phase: IndexMap::new(),
            script_outputs: Vec::new(),
            findings: Vec::new(),
            log: Vec::new(),
        }
    }

    fn record_transaction(&mut self, phase: Phase) {
        self.transactions_sent += 1;
        *self.transactions_by_phase.entry(phase).or_insert(0) += 1;
    }

    fn record_script(&mut self, step: usize, name: &str, args: &[Argument], output: ScriptOutput) {
        self.scripts_run += 1;
        self.script_outputs.push(ScriptRecord {
            step,
            name: name.to_string(),
            args: args.to_vec(),
            output,
        });
    }

    /// No settlement findings
    pub fn success(&self) -> bool {
        self.findings.is_empty()
    }

    /// Print report to stdout
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Orbital Demo Report                                       ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Plan: {:<52}║", self.plan_name);
        println!("║  Steps: {:<51}║", self.steps_executed);
        println!("║  Transactions: {:<44}║", self.transactions_sent);
        println!("║  Scripts: {:<49}║", self.scripts_run);
        for (phase, count) in &self.transactions_by_phase {
            println!("║    {:<20} {:<34}║", phase.title(), count);
        }
        println!(
            "║  Status: {:<50}║",
            if self.success() {
                "SETTLED ✓".to_string()
            } else {
                format!("{} FINDING(S) ✗", self.findings.len())
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝\n");

        for finding in &self.findings {
            println!("  - {}", finding);
        }

        println!("Execution Log:");
        println!("═════════════");
        for entry in &self.log {
            println!("{}", entry);
        }
    }
}
