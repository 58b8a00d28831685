use super::parser::{Scenario, ScenarioStep};
use super::ScenarioError;
use crate::plan::{names, Plan, PlanArg, PlanBuilder};
use crate::verification::SettlementCheck;

/// Maximum nesting of `repeat` blocks
pub const MAX_REPEAT_DEPTH: usize = 8;

/// Maximum amount of expansion work: every emitted step, phase marker and
/// `repeat` iteration counts once
pub const MAX_EXPANDED_STEPS: usize = 100_000;

impl Scenario {
    /// Expand `repeat` blocks, tag every step with its phase and validate
    /// the resulting plan
    pub fn compile(&self) -> Result<Plan, ScenarioError> {
        let mut builder = PlanBuilder::new(self.name.clone());
        if let Some(description) = &self.description {
            builder.description(description.clone());
        }
        for account in &self.accounts {
            builder.existing_account(account.clone());
        }

        let mut emitted = 0;
        compile_steps(&self.steps, &mut builder, 0, &mut emitted)?;

        let plan = builder.build();
        plan.validate()?;
        Ok(plan)
    }
}

fn charge(emitted: &mut usize) -> Result<(), ScenarioError> {
    *emitted += 1;
    if *emitted > MAX_EXPANDED_STEPS {
        return Err(ScenarioError::TooLarge(MAX_EXPANDED_STEPS));
    }
    Ok(())
}

fn compile_steps(
    steps: &[ScenarioStep],
    builder: &mut PlanBuilder,
    depth: usize,
    emitted: &mut usize,
) -> Result<(), ScenarioError> {
    if depth > MAX_REPEAT_DEPTH {
        return Err(ScenarioError::TooDeep(MAX_REPEAT_DEPTH));
    }

    for step in steps {
        // Every step and every repeat iteration counts against the budget
        charge(emitted)?;

        if let ScenarioStep::Phase { name } = step {
            builder.phase(*name);
            continue;
        }
        if let ScenarioStep::Repeat { times, steps } = step {
            if *times == 0 {
                return Err(ScenarioError::InvalidRepeat(*times));
            }
            for _ in 0..*times {
                charge(emitted)?;
                compile_steps(steps, builder, depth + 1, emitted)?;
            }
            continue;
        }

        match step {
            ScenarioStep::Deploy { contract } => builder.deploy(contract),
            ScenarioStep::CreateAccount { account } => builder.create_account(account),
            ScenarioStep::Provision { account, container } => {
                builder.provision(account, *container)
            }
            ScenarioStep::SendTransaction {
                name,
                signer,
                args,
                requires,
            } => builder.transaction(
                name,
                signer,
                args.iter().map(PlanArg::from).collect(),
                requires.clone(),
            ),
            ScenarioStep::RunScript { name, args } => {
                builder.script(name, args.iter().map(PlanArg::from).collect())
            }
            ScenarioStep::Narrate { message } => builder.narrate(message),
            ScenarioStep::Checkpoint { message } => builder.checkpoint(message),
            ScenarioStep::VerifySettlement {
                bidders,
                initial_balance,
                bids,
                script,
            } => builder.verify_settlement(SettlementCheck {
                bidders: bidders.clone(),
                initial_balance: *initial_balance,
                bids: bids.clone(),
                balance_script: script
                    .clone()
                    .unwrap_or_else(|| names::CHECK_ACCOUNT.to_string()),
            }),
            ScenarioStep::Phase { .. } | ScenarioStep::Repeat { .. } => continue,
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Phase, PlanError, Step};
    use crate::scenarios::{parse_scenario, LEGACY_DEMO, ORBITAL_SHORT};

    #[test]
    fn test_repeat_expands_with_phase() {
        let yaml = r#"
name: "Ticks"
steps:
  - action: deploy
    contract: Auction
  - action: phase
    name: epoch_advancement
  - action: repeat
    times: 3
    steps:
      - action: send_transaction
        name: run/check_update_epoch
        signer: Auction
        args:
          - uint64: "1"
      - action: repeat
        times: 2
        steps:
          - action: narrate
            message: "tick"
"#;
        let plan = parse_scenario(yaml).unwrap().compile().unwrap();

        assert_eq!(plan.steps.len(), 1 + 3 * (1 + 2));
        assert_eq!(plan.transaction_count(names::CHECK_UPDATE_EPOCH), 3);
        assert!(plan.steps[1..]
            .iter()
            .all(|planned| planned.phase == Phase::EpochAdvancement));
        assert_eq!(plan.steps[0].phase, Phase::Deployment);
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let yaml = r#"
name: "Nothing"
steps:
  - action: repeat
    times: 0
    steps:
      - action: narrate
        message: "never"
"#;
        assert!(matches!(
            parse_scenario(yaml).unwrap().compile(),
            Err(ScenarioError::InvalidRepeat(0))
        ));
    }

    #[test]
    fn test_compiled_plan_is_validated() {
        let yaml = r#"
name: "Out of order"
steps:
  - action: deploy
    contract: Auction
  - action: send_transaction
    name: list/create_auction
    signer: Auction
    requires:
      - account: Auction
        container: auction_collection
  - action: provision
    account: Auction
    container: auction_collection
"#;
        assert!(matches!(
            parse_scenario(yaml).unwrap().compile(),
            Err(ScenarioError::Plan(PlanError::MissingContainer { index: 2, .. }))
        ));
    }

    #[test]
    fn test_expansion_limit() {
        let yaml = r#"
name: "Huge"
steps:
  - action: repeat
    times: 1000
    steps:
      - action: repeat
        times: 1000
        steps:
          - action: narrate
            message: "again"
"#;
        assert!(matches!(
            parse_scenario(yaml).unwrap().compile(),
            Err(ScenarioError::TooLarge(MAX_EXPANDED_STEPS))
        ));
    }

    #[test]
    fn test_expansion_limit_counts_empty_iterations() {
        let yaml = r#"
name: "Spin"
steps:
  - action: repeat
    times: 4000000000
    steps:
      - action: repeat
        times: 4000000000
        steps:
          - action: phase
            name: bidding
"#;
        assert!(matches!(
            parse_scenario(yaml).unwrap().compile(),
            Err(ScenarioError::TooLarge(MAX_EXPANDED_STEPS))
        ));
    }

    #[test]
    fn test_settlement_mismatch_rejected() {
        let yaml = r#"
name: "Lopsided"
accounts: [Bidder1, Bidder2]
steps:
  - action: phase
    name: verification
  - action: verify_settlement
    bidders: [Bidder1, Bidder2]
    initial_balance: "1000.0"
    bids: ["10.0"]
"#;
        assert!(matches!(
            parse_scenario(yaml).unwrap().compile(),
            Err(ScenarioError::Plan(PlanError::SettlementMismatch {
                index: 1,
                bidders: 2,
                bids: 1,
            }))
        ));
    }

    #[test]
    fn test_bundled_legacy_demo() {
        let plan = parse_scenario(LEGACY_DEMO).unwrap().compile().unwrap();

        assert_eq!(plan.transaction_count(names::MINT_NFT), 10);
        assert_eq!(plan.transaction_count(names::PLACE_BID), 40);
        assert_eq!(plan.transaction_count(names::CHECK_UPDATE_EPOCH), 15);
        assert_eq!(plan.transaction_count(names::PAYOUT_ORBS), 1);
        assert!(plan
            .transactions_named(names::PLACE_BID)
            .all(|step| matches!(step, Step::Transaction { args, .. } if args.is_empty())));
    }

    #[test]
    fn test_bundled_orbital_short() {
        let plan = parse_scenario(ORBITAL_SHORT).unwrap().compile().unwrap();

        assert_eq!(plan.transaction_count(names::PLACE_BID), 4);
        assert!(matches!(
            plan.steps.last().map(|planned| &planned.step),
            Some(Step::VerifySettlement(check)) if check.bidders.len() == 2
        ));
    }
}
