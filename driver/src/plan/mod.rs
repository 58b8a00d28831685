//! Demo plans: ordered lists of phase-tagged steps.
//!
//! A [`Plan`] is pure data. It is built either by [`orbital_plan`] or by
//! compiling a YAML scenario, and checked by [`Plan::validate`] before the
//! executor touches the chain. Validation replays the plan symbolically and
//! rejects anything that would sign with, pay to, or bid from an account
//! whose containers are not in place yet.

pub mod orbital;

pub use orbital::{bidder_names, orbital_plan, DemoParams};

use crate::cadence::Argument;
use crate::verification::SettlementCheck;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Transaction and script identifiers of the auction project
pub mod names {
    pub const CREATE_DEMOTOKEN_VAULT: &str = "setup/create_demotoken_vault";
    pub const CREATE_NFT_COLLECTION: &str = "setup/create_nft_collection";
    pub const CREATE_AUCTION_COLLECTION: &str = "setup/create_auction_collection";
    pub const MINT_NFT: &str = "setup/mint_nft";
    pub const NEW_DEMOTOKEN_MINTER: &str = "setup/new_demotoken_minter";
    pub const MINT_DEMOTOKENS: &str = "setup/mint_demotokens";
    pub const CREATE_AUCTION: &str = "list/create_auction";
    pub const PLACE_BID: &str = "bid/place_bid";
    pub const CHECK_UPDATE_EPOCH: &str = "run/check_update_epoch";
    pub const PAYOUT_ORBS: &str = "payout/payout_orbs";

    pub const CHECK_AUCTIONS: &str = "check_auctions";
    pub const CHECK_EPOCH: &str = "check_epoch";
    pub const CHECK_BIDDERS: &str = "check_bidders";
    pub const CHECK_ACCOUNT: &str = "check_account";
    pub const CHECK_ORBS: &str = "check_orbs";
}

/// Demo phases in their required order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Deployment,
    Provisioning,
    Minting,
    AuctionCreation,
    Bidding,
    EpochAdvancement,
    Payout,
    Verification,
}

impl Phase {
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Deployment => "Contract deployment",
            Phase::Provisioning => "Account provisioning",
            Phase::Minting => "Minting",
            Phase::AuctionCreation => "Auction creation",
            Phase::Bidding => "Bidding",
            Phase::EpochAdvancement => "Epoch advancement",
            Phase::Payout => "Payout",
            Phase::Verification => "Verification",
        }
    }
}

/// Account-scoped resource that has to exist before first use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Container {
    TokenVault,
    NftCollection,
    AuctionCollection,
}

impl Container {
    /// Transaction that creates the container, signed by its owner
    pub fn setup_transaction(&self) -> &'static str {
        match self {
            Container::TokenVault => names::CREATE_DEMOTOKEN_VAULT,
            Container::NftCollection => names::CREATE_NFT_COLLECTION,
            Container::AuctionCollection => names::CREATE_AUCTION_COLLECTION,
        }
    }
}

/// A container a transaction touches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub account: String,
    pub container: Container,
}

impl Requirement {
    pub fn new(account: impl Into<String>, container: Container) -> Self {
        Self {
            account: account.into(),
            container,
        }
    }
}

/// Argument as written in a plan; addresses stay symbolic until execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanArg {
    AddressOf(String),
    Value(Argument),
}

impl From<Argument> for PlanArg {
    fn from(argument: Argument) -> Self {
        PlanArg::Value(argument)
    }
}

impl fmt::Display for PlanArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanArg::AddressOf(account) => write!(f, "Address({})", account),
            PlanArg::Value(argument) => write!(f, "{}", argument),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Deploy {
        contract: String,
    },
    CreateAccount {
        account: String,
    },
    Provision {
        account: String,
        container: Container,
    },
    Transaction {
        name: String,
        signer: String,
        args: Vec<PlanArg>,
        requires: Vec<Requirement>,
    },
    Script {
        name: String,
        args: Vec<PlanArg>,
    },
    Narrate {
        message: String,
    },
    /// Pause point; only blocks when the run is interactive
    Checkpoint {
        message: String,
    },
    VerifySettlement(SettlementCheck),
}

impl Step {
    /// Whether the step submits a transaction
    pub fn is_transaction(&self) -> bool {
        matches!(self, Step::Transaction { .. } | Step::Provision { .. })
    }
}

fn join_args(args: &[PlanArg]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Deploy { contract } => write!(f, "deploy {}", contract),
            Step::CreateAccount { account } => write!(f, "create account {}", account),
            Step::Provision { account, container } => write!(
                f,
                "{} signed by {} ({})",
                container.setup_transaction(),
                account,
                container
            ),
            Step::Transaction {
                name, signer, args, ..
            } => write!(f, "{}({}) signed by {}", name, join_args(args), signer),
            Step::Script { name, args } => write!(f, "script {}({})", name, join_args(args)),
            Step::Narrate { message } => write!(f, "narrate \"{}\"", message),
            Step::Checkpoint { message } => write!(f, "checkpoint \"{}\"", message),
            Step::VerifySettlement(check) => write!(
                f,
                "verify settlement of {} bidders",
                check.bidders.len()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub phase: Phase,
    pub step: Step,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,

    #[error("step {index}: phase goes back from {from} to {to}")]
    PhaseRegression { index: usize, from: Phase, to: Phase },

    #[error("step {index}: contract '{contract}' is deployed twice")]
    DuplicateDeployment { index: usize, contract: String },

    #[error("step {index}: account '{account}' is created twice")]
    DuplicateAccount { index: usize, account: String },

    #[error("step {index}: {container} of '{account}' is set up twice")]
    DuplicateContainer {
        index: usize,
        account: String,
        container: Container,
    },

    #[error("step {index}: account '{account}' is used before it exists")]
    UnknownAccount { index: usize, account: String },

    #[error("step {index}: '{transaction}' needs the {container} of '{account}', which is not set up yet")]
    MissingContainer {
        index: usize,
        transaction: String,
        account: String,
        container: Container,
    },

    #[error("step {index}: settlement check lists {bidders} bidder(s) but {bids} bid(s)")]
    SettlementMismatch {
        index: usize,
        bidders: usize,
        bids: usize,
    },

    #[error("invalid plan parameter: {0}")]
    InvalidParameter(String),
}

/// Ordered demo run
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub name: String,
    pub description: Option<String>,
    /// Accounts that exist before the run without being deployed to
    pub existing_accounts: Vec<String>,
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    /// Statically check ordering; step indexes in errors are 1-based
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut known: HashSet<&str> = self.existing_accounts.iter().map(String::as_str).collect();
        let mut deployed: HashSet<&str> = HashSet::new();
        let mut containers: HashSet<(&str, Container)> = HashSet::new();
        let mut last_phase = None;

        for (position, planned) in self.steps.iter().enumerate() {
            let index = position + 1;

            if let Some(previous) = last_phase {
                if planned.phase < previous {
                    return Err(PlanError::PhaseRegression {
                        index,
                        from: previous,
                        to: planned.phase,
                    });
                }
            }
            last_phase = Some(planned.phase);

            let require_known = |account: &str, known: &HashSet<&str>| {
                if known.contains(account) {
                    Ok(())
                } else {
                    Err(PlanError::UnknownAccount {
                        index,
                        account: account.to_string(),
                    })
                }
            };
            let require_args = |args: &[PlanArg], known: &HashSet<&str>| {
                args.iter().try_for_each(|arg| match arg {
                    PlanArg::AddressOf(account) => require_known(account.as_str(), known),
                    PlanArg::Value(_) => Ok(()),
                })
            };

            match &planned.step {
                Step::Deploy { contract } => {
                    if !deployed.insert(contract.as_str()) {
                        return Err(PlanError::DuplicateDeployment {
                            index,
                            contract: contract.clone(),
                        });
                    }
                    known.insert(contract.as_str());
                }
                Step::CreateAccount { account } => {
                    if !known.insert(account.as_str()) {
                        return Err(PlanError::DuplicateAccount {
                            index,
                            account: account.clone(),
                        });
                    }
                }
                Step::Provision { account, container } => {
                    require_known(account.as_str(), &known)?;
                    if !containers.insert((account.as_str(), *container)) {
                        return Err(PlanError::DuplicateContainer {
                            index,
                            account: account.clone(),
                            container: *container,
                        });
                    }
                }
                Step::Transaction {
                    name,
                    signer,
                    args,
                    requires,
                } => {
                    require_known(signer.as_str(), &known)?;
                    require_args(args, &known)?;
                    for requirement in requires {
                        require_known(requirement.account.as_str(), &known)?;
                        if !containers.contains(&(requirement.account.as_str(), requirement.container)) {
                            return Err(PlanError::MissingContainer {
                                index,
                                transaction: name.clone(),
                                account: requirement.account.clone(),
                                container: requirement.container,
                            });
                        }
                    }
                }
                Step::Script { args, .. } => require_args(args, &known)?,
                Step::VerifySettlement(check) => {
                    if check.bidders.len() != check.bids.len() {
                        return Err(PlanError::SettlementMismatch {
                            index,
                            bidders: check.bidders.len(),
                            bids: check.bids.len(),
                        });
                    }
                    for bidder in &check.bidders {
                        require_known(bidder.as_str(), &known)?;
                    }
                }
                Step::Narrate { .. } | Step::Checkpoint { .. } => {}
            }
        }

        Ok(())
    }

    pub fn settlement_checks(&self) -> impl Iterator<Item = &SettlementCheck> {
        self.steps.iter().filter_map(|planned| match &planned.step {
            Step::VerifySettlement(check) => Some(check),
            _ => None,
        })
    }

    /// Number of submissions of transaction `name`
    pub fn transaction_count(&self, name: &str) -> usize {
        self.transactions_named(name).count()
    }

    pub fn transactions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Step> + 'a {
        self.steps.iter().map(|planned| &planned.step).filter(move |step| {
            matches!(step, Step::Transaction { name: sent, .. } if sent == name)
        })
    }

    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(move |planned| planned.phase == phase)
            .map(|planned| &planned.step)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan: {}", self.name)?;
        if let Some(description) = &self.description {
            writeln!(f, "{}", description)?;
        }
        for (position, planned) in self.steps.iter().enumerate() {
            writeln!(
                f,
                "{:>4} [{}] {}",
                position + 1,
                planned.phase,
                planned.step
            )?;
        }
        Ok(())
    }
}

/// Appends steps under the current phase
pub struct PlanBuilder {
    plan: Plan,
    phase: Phase,
}

impl PlanBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            plan: Plan {
                name: name.into(),
                description: None,
                existing_accounts: Vec::new(),
                steps: Vec::new(),
            },
            phase: Phase::Deployment,
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.plan.description = Some(description.into());
        self
    }

    pub fn existing_account(&mut self, account: impl Into<String>) -> &mut Self {
        self.plan.existing_accounts.push(account.into());
        self
    }

    pub fn phase(&mut self, phase: Phase) -> &mut Self {
        self.phase = phase;
        self
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    pub fn push(&mut self, step: Step) -> &mut Self {
        self.plan.steps.push(PlannedStep {
            phase: self.phase,
            step,
        });
        self
    }

    pub fn deploy(&mut self, contract: impl Into<String>) -> &mut Self {
        self.push(Step::Deploy {
            contract: contract.into(),
        })
    }

    pub fn create_account(&mut self, account: impl Into<String>) -> &mut Self {
        self.push(Step::CreateAccount {
            account: account.into(),
        })
    }

    pub fn provision(&mut self, account: impl Into<String>, container: Container) -> &mut Self {
        self.push(Step::Provision {
            account: account.into(),
            container,
        })
    }

    pub fn transaction(
        &mut self,
        name: impl Into<String>,
        signer: impl Into<String>,
        args: Vec<PlanArg>,
        requires: Vec<Requirement>,
    ) -> &mut Self {
        self.push(Step::Transaction {
            name: name.into(),
            signer: signer.into(),
            args,
            requires,
        })
    }

    pub fn script(&mut self, name: impl Into<String>, args: Vec<PlanArg>) -> &mut Self {
        self.push(Step::Script {
            name: name.into(),
            args,
        })
    }

    pub fn narrate(&mut self, message: impl Into<String>) -> &mut Self {
        self.push(Step::Narrate {
            message: message.into(),
        })
    }

    pub fn checkpoint(&mut self, message: impl Into<String>) -> &mut Self {
        self.push(Step::Checkpoint {
            message: message.into(),
        })
    }

    pub fn verify_settlement(&mut self, check: SettlementCheck) -> &mut Self {
        self.push(Step::VerifySettlement(check))
    }

    pub fn build(self) -> Plan {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadence::UFix64;
    use strum::IntoEnumIterator;

    fn provisioned_builder() -> PlanBuilder {
        let mut builder = PlanBuilder::new("test");
        builder.deploy("Auction");
        builder.phase(Phase::Provisioning);
        builder.provision("Auction", Container::AuctionCollection);
        builder.create_account("Bidder1");
        builder
    }

    #[test]
    fn test_phase_order() {
        let phases: Vec<Phase> = Phase::iter().collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
        assert_eq!(Phase::EpochAdvancement.to_string(), "epoch_advancement");
        assert_eq!(Container::NftCollection.setup_transaction(), names::CREATE_NFT_COLLECTION);
    }

    #[test]
    fn test_valid_plan() {
        let mut builder = provisioned_builder();
        builder.provision("Bidder1", Container::TokenVault);
        builder.phase(Phase::Bidding);
        builder.transaction(
            names::PLACE_BID,
            "Bidder1",
            vec![PlanArg::AddressOf("Auction".to_string()), Argument::UInt64(1).into()],
            vec![
                Requirement::new("Bidder1", Container::TokenVault),
                Requirement::new("Auction", Container::AuctionCollection),
            ],
        );
        let plan = builder.build();

        assert_eq!(plan.validate(), Ok(()));
        assert_eq!(plan.transaction_count(names::PLACE_BID), 1);
        assert_eq!(plan.steps_in(Phase::Provisioning).count(), 3);
    }

    #[test]
    fn test_missing_container_rejected() {
        let mut builder = provisioned_builder();
        builder.phase(Phase::Bidding);
        builder.transaction(
            names::PLACE_BID,
            "Bidder1",
            vec![],
            vec![Requirement::new("Bidder1", Container::TokenVault)],
        );
        // Provisioning the vault after the bid does not help
        builder.provision("Bidder1", Container::TokenVault);

        assert_eq!(
            builder.build().validate(),
            Err(PlanError::MissingContainer {
                index: 4,
                transaction: names::PLACE_BID.to_string(),
                account: "Bidder1".to_string(),
                container: Container::TokenVault,
            })
        );
    }

    #[test]
    fn test_unknown_accounts_rejected() {
        let mut builder = PlanBuilder::new("test");
        builder.script(names::CHECK_ACCOUNT, vec![PlanArg::AddressOf("Bidder3".to_string())]);
        assert!(matches!(
            builder.build().validate(),
            Err(PlanError::UnknownAccount { index: 1, ref account }) if account == "Bidder3"
        ));

        let mut builder = PlanBuilder::new("test");
        builder.existing_account("emulator-account");
        builder.transaction("custom/ping", "emulator-account", vec![], vec![]);
        assert_eq!(builder.build().validate(), Ok(()));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut builder = provisioned_builder();
        builder.create_account("Bidder1");
        assert!(matches!(
            builder.build().validate(),
            Err(PlanError::DuplicateAccount { index: 4, .. })
        ));

        let mut builder = provisioned_builder();
        builder.provision("Auction", Container::AuctionCollection);
        assert!(matches!(
            builder.build().validate(),
            Err(PlanError::DuplicateContainer { .. })
        ));

        let mut builder = PlanBuilder::new("test");
        builder.deploy("Rocks").deploy("Rocks");
        assert!(matches!(
            builder.build().validate(),
            Err(PlanError::DuplicateDeployment { index: 2, .. })
        ));
    }

    #[test]
    fn test_settlement_check_needs_one_bid_per_bidder() {
        let grant: UFix64 = "1000.0".parse().unwrap();
        let check = |bids: Vec<UFix64>| SettlementCheck {
            bidders: vec!["Bidder1".to_string(), "Auction".to_string()],
            initial_balance: grant,
            bids,
            balance_script: names::CHECK_ACCOUNT.to_string(),
        };

        let mut builder = provisioned_builder();
        builder.phase(Phase::Verification);
        builder.verify_settlement(check(vec!["10.0".parse().unwrap()]));
        assert_eq!(
            builder.build().validate(),
            Err(PlanError::SettlementMismatch {
                index: 4,
                bidders: 2,
                bids: 1,
            })
        );

        let mut builder = provisioned_builder();
        builder.phase(Phase::Verification);
        builder.verify_settlement(check(vec!["10.0".parse().unwrap(), "12.5".parse().unwrap()]));
        assert_eq!(builder.build().validate(), Ok(()));
    }

    #[test]
    fn test_phase_regression_rejected() {
        let mut builder = provisioned_builder();
        builder.phase(Phase::Deployment);
        builder.deploy("Rocks");

        assert_eq!(
            builder.build().validate(),
            Err(PlanError::PhaseRegression {
                index: 4,
                from: Phase::Provisioning,
                to: Phase::Deployment,
            })
        );
        assert_eq!(PlanBuilder::new("empty").build().validate(), Err(PlanError::Empty));
    }
}
