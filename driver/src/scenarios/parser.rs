use super::ScenarioError;
use crate::cadence::{Argument, UFix64};
use crate::plan::{Container, Phase, PlanArg, Requirement};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Accounts that already exist in the project, e.g. the service account
    #[serde(default)]
    pub accounts: Vec<String>,

    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    Phase {
        name: Phase,
    },
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
    SendTransaction {
        name: String,
        signer: String,
        #[serde(default)]
        args: Vec<ArgSpec>,
        #[serde(default)]
        requires: Vec<Requirement>,
    },
    RunScript {
        name: String,
        #[serde(default)]
        args: Vec<ArgSpec>,
    },
    Narrate {
        message: String,
    },
    Checkpoint {
        message: String,
    },
    Repeat {
        times: u32,
        steps: Vec<ScenarioStep>,
    },
    VerifySettlement {
        bidders: Vec<String>,
        initial_balance: UFix64,
        bids: Vec<UFix64>,
        #[serde(default)]
        script: Option<String>,
    },
}

/// A typed argument written as a single-key map, e.g. `ufix64: "60.0"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawArg")]
pub enum ArgSpec {
    /// Address of a named account, resolved at execution time
    Address(String),
    UInt64(u64),
    UFix64(UFix64),
    String(String),
}

impl From<&ArgSpec> for PlanArg {
    fn from(spec: &ArgSpec) -> Self {
        match spec {
            ArgSpec::Address(account) => PlanArg::AddressOf(account.clone()),
            ArgSpec::UInt64(value) => PlanArg::Value(Argument::UInt64(*value)),
            ArgSpec::UFix64(value) => PlanArg::Value(Argument::UFix64(*value)),
            ArgSpec::String(value) => PlanArg::Value(Argument::String(value.clone())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrText {
    Int(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArg {
    address: Option<String>,
    uint64: Option<IntOrText>,
    ufix64: Option<String>,
    string: Option<String>,
}

impl TryFrom<RawArg> for ArgSpec {
    type Error = String;

    fn try_from(raw: RawArg) -> Result<Self, Self::Error> {
        match raw {
            RawArg {
                address: Some(account),
                uint64: None,
                ufix64: None,
                string: None,
            } => Ok(ArgSpec::Address(account)),
            RawArg {
                address: None,
                uint64: Some(value),
                ufix64: None,
                string: None,
            } => match value {
                IntOrText::Int(value) => Ok(ArgSpec::UInt64(value)),
                IntOrText::Text(text) => text
                    .trim()
                    .parse()
                    .map(ArgSpec::UInt64)
                    .map_err(|e| format!("invalid uint64 '{}': {}", text, e)),
            },
            RawArg {
                address: None,
                uint64: None,
                ufix64: Some(text),
                string: None,
            } => text
                .parse()
                .map(ArgSpec::UFix64)
                .map_err(|e: crate::cadence::CadenceError| e.to_string()),
            RawArg {
                address: None,
                uint64: None,
                ufix64: None,
                string: Some(text),
            } => Ok(ArgSpec::String(text)),
            _ => Err(
                "an argument is exactly one of address, uint64, ufix64 or string".to_string(),
            ),
        }
    }
}

/// Parse scenario YAML
pub fn parse_scenario(yaml: &str) -> Result<Scenario, ScenarioError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Read and parse a scenario file
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_scenario(&yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let yaml = r#"
name: "Args"
steps:
  - action: send_transaction
    name: bid/place_bid
    signer: Bidder1
    args:
      - address: Auction
      - uint64: "1"
      - uint64: 2
      - ufix64: "60.0"
      - string: "hello"
"#;
        let scenario = parse_scenario(yaml).unwrap();
        let ScenarioStep::SendTransaction { args, requires, .. } = &scenario.steps[0] else {
            panic!("expected a transaction step");
        };
        assert!(requires.is_empty());
        assert_eq!(
            args,
            &vec![
                ArgSpec::Address("Auction".to_string()),
                ArgSpec::UInt64(1),
                ArgSpec::UInt64(2),
                ArgSpec::UFix64("60.0".parse().unwrap()),
                ArgSpec::String("hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_reject_ambiguous_or_lossy_arguments() {
        let two_keys = r#"
name: "Bad"
steps:
  - action: run_script
    name: check_account
    args:
      - address: Bidder1
        uint64: "1"
"#;
        assert!(parse_scenario(two_keys).is_err());

        let float = r#"
name: "Bad"
steps:
  - action: run_script
    name: check_account
    args:
      - ufix64: 60.0
"#;
        assert!(parse_scenario(float).is_err());

        let negative = r#"
name: "Bad"
steps:
  - action: run_script
    name: check_account
    args:
      - ufix64: "-1.0"
"#;
        assert!(parse_scenario(negative).is_err());
    }

    #[test]
    fn test_parse_settlement_and_requirements() {
        let yaml = r#"
name: "Settle"
accounts: [emulator-account]
steps:
  - action: phase
    name: verification
  - action: send_transaction
    name: payout/payout_orbs
    signer: Auction
    requires:
      - account: Auction
        container: auction_collection
  - action: verify_settlement
    bidders: [Bidder1, Bidder2]
    initial_balance: "100000.0"
    bids: ["60.0", "65.0"]
"#;
        let scenario = parse_scenario(yaml).unwrap();
        assert_eq!(scenario.accounts, vec!["emulator-account"]);
        assert_eq!(
            scenario.steps[0],
            ScenarioStep::Phase {
                name: Phase::Verification
            }
        );
        assert!(matches!(
            &scenario.steps[1],
            ScenarioStep::SendTransaction { requires, .. }
                if requires == &vec![Requirement::new("Auction", Container::AuctionCollection)]
        ));
        assert!(matches!(
            &scenario.steps[2],
            ScenarioStep::VerifySettlement { bids, script: None, .. } if bids.len() == 2
        ));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = r#"
name: "Bad"
steps:
  - action: mine_block
"#;
        assert!(matches!(parse_scenario(yaml), Err(ScenarioError::Parse(_))));
        assert!(matches!(
            load_scenario(Path::new("/nonexistent/scenario.yaml")),
            Err(ScenarioError::Io { .. })
        ));
    }
}
