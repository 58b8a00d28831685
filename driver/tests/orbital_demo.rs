//! End-to-end runs of the orbital walkthrough against the recording backend

use orbital_driver::cadence::{Address, Argument, CadenceValue, UFix64};
use orbital_driver::executor::{DriverError, Executor, StepError};
use orbital_driver::plan::{names, orbital_plan, DemoParams, Phase};
use orbital_driver::tooling::{Invocation, RecordingTooling, ScriptOutput, ToolingError};
use orbital_driver::verification::Finding;
use std::collections::HashMap;
use std::sync::Arc;

fn ufix(text: &str) -> UFix64 {
    text.parse().unwrap()
}

/// Answers `check_account` with a fixed balance per bidder address
fn with_balances(tooling: RecordingTooling, balances: &[(&str, &str)]) -> RecordingTooling {
    let by_address: HashMap<Address, UFix64> = balances
        .iter()
        .map(|(name, balance)| (RecordingTooling::derive_address(name), ufix(balance)))
        .collect();

    tooling.with_script_responder(move |name, args| {
        if name != names::CHECK_ACCOUNT {
            return None;
        }
        match args.first() {
            Some(Argument::Address(address)) => by_address.get(address).map(|balance| ScriptOutput {
                raw: balance.to_string(),
                value: Some(CadenceValue::UFix64(*balance)),
            }),
            _ => None,
        }
    })
}

fn settled_balances() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Bidder1", "100000.0"),
        ("Bidder2", "99025.0"),
        ("Bidder3", "100000.0"),
        ("Bidder4", "100000.0"),
        ("Bidder5", "100000.0"),
        ("Bidder6", "100000.0"),
    ]
}

#[tokio::test]
async fn test_orbital_demo_end_to_end() {
    let plan = orbital_plan(&DemoParams::default()).unwrap();
    let tooling = Arc::new(with_balances(RecordingTooling::new(), &settled_balances()));

    let mut executor = Executor::new(tooling.clone());
    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success(), "unexpected findings: {:?}", report.findings);
    assert_eq!(report.transactions_sent, 140);
    assert_eq!(report.transactions_by_phase[&Phase::Bidding], 90);
    assert_eq!(report.transactions_by_phase[&Phase::EpochAdvancement], 15);

    let invocations = tooling.invocations();
    let deploys: Vec<&Invocation> = invocations
        .iter()
        .filter(|invocation| matches!(invocation, Invocation::DeployContract(_)))
        .collect();
    assert_eq!(
        deploys,
        vec![
            &Invocation::DeployContract("NonFungibleToken".to_string()),
            &Invocation::DeployContract("DemoToken".to_string()),
            &Invocation::DeployContract("Rocks".to_string()),
            &Invocation::DeployContract("Auction".to_string()),
        ]
    );
    let created = invocations
        .iter()
        .filter(|invocation| matches!(invocation, Invocation::CreateAccount(_)))
        .count();
    assert_eq!(created, 6);

    assert_eq!(tooling.transactions_named(names::MINT_NFT).len(), 10);
    assert_eq!(tooling.transactions_named(names::NEW_DEMOTOKEN_MINTER).len(), 1);
    assert_eq!(tooling.transactions_named(names::MINT_DEMOTOKENS).len(), 7);
    assert_eq!(tooling.transactions_named(names::CHECK_UPDATE_EPOCH).len(), 15);
    assert_eq!(tooling.transactions_named(names::PAYOUT_ORBS).len(), 1);

    let auction = RecordingTooling::derive_address("Auction");
    assert_eq!(
        tooling.transactions_named(names::CREATE_AUCTION),
        vec![vec![Argument::UInt64(8), Argument::UInt64(12)]]
    );

    let bids = tooling.transactions_named(names::PLACE_BID);
    assert_eq!(bids.len(), 90);
    let expected_amounts = ["60.0", "65.0", "55.0", "25.0", "35.0", "62.0"];
    for (position, args) in bids.iter().enumerate() {
        assert_eq!(
            args,
            &vec![
                Argument::Address(auction),
                Argument::UInt64(1),
                Argument::UFix64(ufix(expected_amounts[position % 6])),
            ]
        );
    }

    // Vaults exist before the first grant reaches each recipient
    let first_grant = invocations
        .iter()
        .position(|invocation| {
            matches!(invocation, Invocation::SendTransaction { name, .. } if name == names::MINT_DEMOTOKENS)
        })
        .unwrap();
    let last_vault = invocations
        .iter()
        .rposition(|invocation| {
            matches!(invocation, Invocation::SendTransaction { name, .. } if name == names::CREATE_DEMOTOKEN_VAULT)
        })
        .unwrap();
    assert!(last_vault < first_grant);
}

#[tokio::test]
async fn test_uncharged_winner_is_reported() {
    let plan = orbital_plan(&DemoParams::default()).unwrap();
    let mut balances = settled_balances();
    balances[1] = ("Bidder2", "100000.0");
    balances[3] = ("Bidder4", "99975.0");
    let tooling = Arc::new(with_balances(RecordingTooling::new(), &balances));

    let report = Executor::new(tooling).execute(&plan).await.unwrap();

    assert!(!report.success());
    assert_eq!(report.findings.len(), 2);
    assert!(report.findings.iter().any(|finding| matches!(
        finding,
        Finding::WinnerNotCharged { bidder, .. } if bidder == "Bidder2"
    )));
    assert!(report.findings.iter().any(|finding| matches!(
        finding,
        Finding::LoserNotRefunded { bidder, .. } if bidder == "Bidder4"
    )));
}

#[tokio::test]
async fn test_failed_bid_aborts_the_run() {
    let plan = orbital_plan(&DemoParams::default()).unwrap();
    let tooling = Arc::new(RecordingTooling::new().fail_transaction(names::PLACE_BID));

    let err = Executor::new(tooling.clone())
        .execute(&plan)
        .await
        .unwrap_err();

    match err {
        DriverError::Step {
            phase,
            source: StepError::Tooling(ToolingError::TransactionFailed { name, signer, .. }),
            ..
        } => {
            assert_eq!(phase, Phase::Bidding);
            assert_eq!(name, names::PLACE_BID);
            assert_eq!(signer, "Bidder1");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing after the first bid was attempted
    assert!(tooling.transactions_named(names::CHECK_UPDATE_EPOCH).is_empty());
    assert!(tooling.transactions_named(names::PAYOUT_ORBS).is_empty());
}

#[tokio::test]
async fn test_smaller_demo() {
    let params = DemoParams {
        bidder_count: 2,
        nft_count: 3,
        bid_rounds: 4,
        bid_amounts: vec![ufix("5.0"), ufix("7.5")],
        epoch_count: 2,
        epoch_ticks: 2,
        ..DemoParams::default()
    };
    let plan = orbital_plan(&params).unwrap();
    let tooling = Arc::new(with_balances(
        RecordingTooling::new(),
        &[("Bidder1", "100000.0"), ("Bidder2", "99970.0")],
    ));

    let report = Executor::new(tooling.clone()).execute(&plan).await.unwrap();

    assert!(report.success());
    assert_eq!(tooling.transactions_named(names::MINT_NFT).len(), 3);
    assert_eq!(tooling.transactions_named(names::PLACE_BID).len(), 8);
    assert_eq!(tooling.transactions_named(names::CHECK_UPDATE_EPOCH).len(), 2);
    assert_eq!(tooling.transactions_named(names::MINT_DEMOTOKENS).len(), 3);
}

#[tokio::test]
async fn test_dry_run_recorder_settles_cleanly() {
    let plan = orbital_plan(&DemoParams::default()).unwrap();
    let tooling = Arc::new(RecordingTooling::for_dry_run(&plan));

    let report = Executor::new(tooling.clone()).execute(&plan).await.unwrap();

    assert!(report.success(), "unexpected findings: {:?}", report.findings);
    assert_eq!(tooling.scripts_named(names::CHECK_ACCOUNT).len(), 6 * 3);
}
