use super::{FlowTooling, ScriptOutput, ToolingError, TransactionReceipt};
use crate::cadence::{Address, Argument, CadenceValue, UFix64};
use crate::plan::Plan;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

/// One call made against [`RecordingTooling`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    DeployContract(String),
    CreateAccount(String),
    FindAddress(String),
    SendTransaction {
        name: String,
        signer: String,
        args: Vec<Argument>,
    },
    RunScript {
        name: String,
        args: Vec<Argument>,
    },
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::DeployContract(name) => write!(f, "deploy {}", name),
            Invocation::CreateAccount(name) => write!(f, "create account {}", name),
            Invocation::FindAddress(name) => write!(f, "find address {}", name),
            Invocation::SendTransaction { name, signer, args } => {
                write!(f, "tx {} signed by {}", name, signer)?;
                write_args(f, args)
            }
            Invocation::RunScript { name, args } => {
                write!(f, "script {}", name)?;
                write_args(f, args)
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Argument]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    write!(f, " [{}]", rendered.join(", "))
}

type ScriptResponder = Box<dyn Fn(&str, &[Argument]) -> Option<ScriptOutput> + Send + Sync>;

#[derive(Default)]
struct State {
    accounts: HashMap<String, Address>,
    deployed: HashSet<String>,
    invocations: Vec<Invocation>,
    sealed: u64,
}

/// In-process tooling that accepts every well-formed call and records it.
///
/// Contract accounts come into existence when their contract is deployed;
/// other accounts when they are created or pre-registered. Addresses are
/// derived from the account name, so the same name always maps to the same
/// address across runs. Scripts return `Void` unless a responder is set.
pub struct RecordingTooling {
    state: Mutex<State>,
    responder: Option<ScriptResponder>,
    failing: HashSet<String>,
}

impl RecordingTooling {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            responder: None,
            failing: HashSet::new(),
        }
    }

    /// Accounts that already exist before the run
    pub fn with_accounts<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Ok(mut state) = self.state.lock() {
            for name in names {
                let name = name.as_ref();
                state
                    .accounts
                    .insert(name.to_string(), Self::derive_address(name));
            }
        }
        self
    }

    /// Answer scripts from `responder`; a `None` answer falls back to `Void`
    pub fn with_script_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &[Argument]) -> Option<ScriptOutput> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Answer `script` with a fixed balance for each named account; other
    /// scripts and accounts fall back to `Void`
    pub fn with_balance_script<I, S>(self, script: &str, balances: I) -> Self
    where
        I: IntoIterator<Item = (S, UFix64)>,
        S: AsRef<str>,
    {
        let script = script.to_string();
        let by_address: HashMap<Address, UFix64> = balances
            .into_iter()
            .map(|(name, balance)| (Self::derive_address(name.as_ref()), balance))
            .collect();

        self.with_script_responder(move |name, args| {
            if name != script {
                return None;
            }
            let Some(Argument::Address(address)) = args.first() else {
                return None;
            };
            by_address.get(address).map(|balance| ScriptOutput {
                raw: balance.to_string(),
                value: Some(CadenceValue::UFix64(*balance)),
            })
        })
    }

    /// Recorder for a dry run of `plan`: its pre-existing accounts are
    /// registered and the balance script of its first settlement check
    /// reports a clean settlement
    pub fn for_dry_run(plan: &Plan) -> Self {
        let tooling = Self::new().with_accounts(&plan.existing_accounts);
        match plan.settlement_checks().next() {
            Some(check) => {
                info!(
                    "Dry run: '{}' answers with the expected settlement balances",
                    check.balance_script
                );
                tooling.with_balance_script(&check.balance_script, check.expected_balances())
            }
            None => tooling,
        }
    }

    /// Make every submission of transaction `name` fail
    pub fn fail_transaction(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Stable pseudo address for an account name (FNV-1a over the name)
    pub fn derive_address(name: &str) -> Address {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in name.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        Address::new(hash.to_be_bytes())
    }

    /// Every call so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state
            .lock()
            .map(|state| state.invocations.clone())
            .unwrap_or_default()
    }

    /// Arguments of every submission of transaction `name`, in order
    pub fn transactions_named(&self, name: &str) -> Vec<Vec<Argument>> {
        self.invocations()
            .into_iter()
            .filter_map(|invocation| match invocation {
                Invocation::SendTransaction { name: sent, args, .. } if sent == name => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn scripts_named(&self, name: &str) -> Vec<Vec<Argument>> {
        self.invocations()
            .into_iter()
            .filter_map(|invocation| match invocation {
                Invocation::RunScript { name: ran, args } if ran == name => Some(args),
                _ => None,
            })
            .collect()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Default for RecordingTooling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowTooling for RecordingTooling {
    async fn deploy_contract(&self, contract: &str) -> Result<(), ToolingError> {
        self.with_state(|state| {
            state
                .invocations
                .push(Invocation::DeployContract(contract.to_string()));
            if !state.deployed.insert(contract.to_string()) {
                return Err(ToolingError::DeploymentFailed {
                    contract: contract.to_string(),
                    reason: "contract already deployed".to_string(),
                });
            }
            state
                .accounts
                .entry(contract.to_string())
                .or_insert_with(|| Self::derive_address(contract));
            debug!("Recorded deployment of {}", contract);
            Ok(())
        })
    }

    async fn create_account(&self, account: &str) -> Result<Address, ToolingError> {
        self.with_state(|state| {
            state
                .invocations
                .push(Invocation::CreateAccount(account.to_string()));
            if state.accounts.contains_key(account) {
                return Err(ToolingError::AccountExists(account.to_string()));
            }
            let address = Self::derive_address(account);
            state.accounts.insert(account.to_string(), address);
            Ok(address)
        })
    }

    async fn find_address(&self, account: &str) -> Result<Address, ToolingError> {
        self.with_state(|state| {
            state
                .invocations
                .push(Invocation::FindAddress(account.to_string()));
            state
                .accounts
                .get(account)
                .copied()
                .ok_or_else(|| ToolingError::UnknownAccount(account.to_string()))
        })
    }

    async fn send_transaction_with_arguments(
        &self,
        name: &str,
        signer: &str,
        args: &[Argument],
    ) -> Result<TransactionReceipt, ToolingError> {
        self.with_state(|state| {
            state.invocations.push(Invocation::SendTransaction {
                name: name.to_string(),
                signer: signer.to_string(),
                args: args.to_vec(),
            });
            if !state.accounts.contains_key(signer) {
                return Err(ToolingError::UnknownAccount(signer.to_string()));
            }
            if self.failing.contains(name) {
                return Err(ToolingError::TransactionFailed {
                    name: name.to_string(),
                    signer: signer.to_string(),
                    reason: "rejected by recording tooling".to_string(),
                });
            }
            state.sealed += 1;
            Ok(TransactionReceipt::sealed(format!("{:064x}", state.sealed)))
        })
    }

    async fn run_script(
        &self,
        name: &str,
        args: &[Argument],
    ) -> Result<ScriptOutput, ToolingError> {
        self.with_state(|state| {
            state.invocations.push(Invocation::RunScript {
                name: name.to_string(),
                args: args.to_vec(),
            });
        });

        let answer = self
            .responder
            .as_ref()
            .and_then(|responder| responder(name, args));

        Ok(answer.unwrap_or_else(|| ScriptOutput {
            raw: r#"{"type":"Void"}"#.to_string(),
            value: Some(CadenceValue::Void),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_balance_script_answers_known_accounts() {
        let grant: UFix64 = "1000.0".parse().unwrap();
        let tooling = RecordingTooling::new()
            .with_balance_script("check_account", [("Bidder1", grant)]);

        let bidder = [Argument::Address(RecordingTooling::derive_address("Bidder1"))];
        let output = tooling.run_script("check_account", &bidder).await.unwrap();
        assert_eq!(output.value, Some(CadenceValue::UFix64(grant)));
        assert_eq!(output.raw, "1000.00000000");

        let stranger = [Argument::Address(RecordingTooling::derive_address("Bidder9"))];
        let output = tooling.run_script("check_account", &stranger).await.unwrap();
        assert_eq!(output.value, Some(CadenceValue::Void));

        let output = tooling.run_script("check_orbs", &bidder).await.unwrap();
        assert_eq!(output.value, Some(CadenceValue::Void));
    }

    #[tokio::test]
    async fn test_deploy_registers_contract_account() {
        let tooling = RecordingTooling::new();
        tooling.deploy_contract("Rocks").await.unwrap();

        assert_eq!(
            tooling.find_address("Rocks").await.unwrap(),
            RecordingTooling::derive_address("Rocks")
        );
        assert!(matches!(
            tooling.deploy_contract("Rocks").await,
            Err(ToolingError::DeploymentFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_accounts_and_signers() {
        let tooling = RecordingTooling::new().with_accounts(["Auction"]);

        let bidder = tooling.create_account("Bidder1").await.unwrap();
        assert_ne!(bidder, RecordingTooling::derive_address("Auction"));
        assert!(matches!(
            tooling.create_account("Bidder1").await,
            Err(ToolingError::AccountExists(_))
        ));

        assert!(matches!(
            tooling.send_transaction("setup/create_demotoken_vault", "Bidder2").await,
            Err(ToolingError::UnknownAccount(name)) if name == "Bidder2"
        ));

        let receipt = tooling
            .send_transaction_with_arguments(
                "bid/place_bid",
                "Bidder1",
                &[Argument::UInt64(1)],
            )
            .await
            .unwrap();
        assert!(receipt.is_success());
        assert_eq!(
            tooling.transactions_named("bid/place_bid"),
            vec![vec![Argument::UInt64(1)]]
        );
    }

    #[tokio::test]
    async fn test_failing_transaction() {
        let tooling = RecordingTooling::new()
            .with_accounts(["Auction"])
            .fail_transaction("payout/payout_orbs");

        let err = tooling
            .send_transaction("payout/payout_orbs", "Auction")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolingError::TransactionFailed { .. }));
        // The failed attempt is still recorded
        assert_eq!(tooling.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_script_responder() {
        let tooling = RecordingTooling::new().with_script_responder(|name, _| {
            (name == "check_account").then(|| ScriptOutput {
                raw: "42".to_string(),
                value: None,
            })
        });

        let account = tooling.run_script("check_account", &[]).await.unwrap();
        assert_eq!(account.raw, "42");

        let other = tooling.run_script("check_orbs", &[]).await.unwrap();
        assert_eq!(other.value, Some(CadenceValue::Void));
        assert_eq!(tooling.scripts_named("check_orbs").len(), 1);
    }

    #[test]
    fn test_derived_addresses_are_stable() {
        assert_eq!(
            RecordingTooling::derive_address("Bidder1"),
            RecordingTooling::derive_address("Bidder1")
        );
        assert_ne!(
            RecordingTooling::derive_address("Bidder1"),
            RecordingTooling::derive_address("Bidder2")
        );
        assert_eq!(
            Invocation::SendTransaction {
                name: "run/check_update_epoch".to_string(),
                signer: "Auction".to_string(),
                args: vec![Argument::UInt64(1)],
            }
            .to_string(),
            "tx run/check_update_epoch signed by Auction [UInt64(1)]"
        );
    }
}
