//! The orbital auction walkthrough as a [`Plan`].

use super::{names, Container, Phase, Plan, PlanArg, PlanBuilder, PlanError, Requirement};
use crate::cadence::{Argument, UFix64, UFIX64_SCALE};
use crate::verification::SettlementCheck;

const fn tokens(whole: u64) -> UFix64 {
    UFix64::from_units(whole * UFIX64_SCALE)
}

/// Knobs of the orbital demo; defaults reproduce the reference walkthrough
#[derive(Debug, Clone, PartialEq)]
pub struct DemoParams {
    /// Deployed in order, each to the account of the same name
    pub contracts: Vec<String>,
    /// Account that hosts the auction
    pub host: String,
    /// Account holding the NFT minter
    pub nft_minter: String,
    /// Account holding the fungible token administrator
    pub token_admin: String,
    pub bidder_count: usize,
    pub nft_count: usize,
    pub minter_allowance: UFix64,
    pub host_grant: UFix64,
    pub bidder_grant: UFix64,
    pub epoch_count: u64,
    /// Blocks per epoch
    pub epoch_length: u64,
    pub auction_id: u64,
    pub bid_rounds: usize,
    /// One amount per bidder, reused every round
    pub bid_amounts: Vec<UFix64>,
    pub epoch_ticks: usize,
}

impl Default for DemoParams {
    fn default() -> Self {
        Self {
            contracts: ["NonFungibleToken", "DemoToken", "Rocks", "Auction"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            host: "Auction".to_string(),
            nft_minter: "Rocks".to_string(),
            token_admin: "DemoToken".to_string(),
            bidder_count: 6,
            nft_count: 10,
            minter_allowance: tokens(1_000_000),
            host_grant: tokens(100_000),
            bidder_grant: tokens(100_000),
            epoch_count: 8,
            epoch_length: 12,
            auction_id: 1,
            bid_rounds: 15,
            bid_amounts: [60, 65, 55, 25, 35, 62].into_iter().map(tokens).collect(),
            epoch_ticks: 15,
        }
    }
}

impl DemoParams {
    pub fn validate(&self) -> Result<(), PlanError> {
        let invalid = |reason: String| Err(PlanError::InvalidParameter(reason));

        if self.bidder_count == 0 {
            return invalid("at least one bidder is required".to_string());
        }
        if self.bid_amounts.len() != self.bidder_count {
            return invalid(format!(
                "{} bid amounts for {} bidders",
                self.bid_amounts.len(),
                self.bidder_count
            ));
        }
        if self.epoch_count == 0 || self.epoch_length == 0 {
            return invalid("epoch count and epoch length must be positive".to_string());
        }
        if (self.epoch_ticks as u64) < self.epoch_count {
            return invalid(format!(
                "{} epoch ticks cannot finish {} epochs",
                self.epoch_ticks, self.epoch_count
            ));
        }
        if self.bid_rounds == 0 {
            return invalid("at least one bid round is required".to_string());
        }

        let granted = self
            .bidder_grant
            .checked_mul_int(self.bidder_count as u64)
            .and_then(|bidders| bidders.checked_add(self.host_grant));
        match granted {
            Some(total) if total <= self.minter_allowance => {}
            _ => {
                return invalid(format!(
                    "grants exceed the minter allowance of {}",
                    self.minter_allowance
                ))
            }
        }

        let committed = self
            .bid_amounts
            .iter()
            .map(|bid| bid.checked_mul_int(self.bid_rounds as u64))
            .max()
            .flatten();
        if committed.map_or(true, |most| most > self.bidder_grant) {
            return invalid(format!(
                "{} rounds of bidding exceed the bidder grant of {}",
                self.bid_rounds, self.bidder_grant
            ));
        }

        Ok(())
    }
}

/// `Bidder1..BidderN`
pub fn bidder_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Bidder{}", i)).collect()
}

fn address_of(account: &str) -> PlanArg {
    PlanArg::AddressOf(account.to_string())
}

fn inspect_auction(plan: &mut PlanBuilder, params: &DemoParams, bidders: &[String]) {
    let auction = || vec![address_of(&params.host), Argument::UInt64(params.auction_id).into()];

    plan.script(names::CHECK_EPOCH, auction());
    plan.script(names::CHECK_BIDDERS, auction());
    for bidder in bidders {
        plan.script(names::CHECK_ACCOUNT, vec![address_of(bidder)]);
    }
    plan.script(names::CHECK_ORBS, auction());
}

/// Build and validate the orbital demo plan
pub fn orbital_plan(params: &DemoParams) -> Result<Plan, PlanError> {
    params.validate()?;

    let host = params.host.as_str();
    let bidders = bidder_names(params.bidder_count);
    let auction_id = || PlanArg::from(Argument::UInt64(params.auction_id));

    let mut plan = PlanBuilder::new("Orbital Auction");
    plan.description("Orbital Auction | Proof of Concept Demo");

    plan.phase(Phase::Deployment);
    plan.narrate("Orbital Auction | Proof of Concept Demo");
    for contract in &params.contracts {
        plan.deploy(contract);
    }
    plan.narrate("Smart Contracts Deployed...");

    plan.phase(Phase::Provisioning);
    plan.narrate("Set up the auction host account with a token vault, an NFT collection and an auction collection");
    plan.provision(host, Container::TokenVault);
    plan.provision(host, Container::NftCollection);
    plan.provision(host, Container::AuctionCollection);

    plan.narrate(format!(
        "Create and set up the {} bidder accounts",
        params.bidder_count
    ));
    for bidder in &bidders {
        plan.create_account(bidder);
    }
    for bidder in &bidders {
        plan.provision(bidder, Container::TokenVault);
        plan.provision(bidder, Container::NftCollection);
    }

    plan.phase(Phase::Minting);
    plan.narrate(format!(
        "Mint {} NFTs to use as auction prizes",
        params.nft_count
    ));
    for _ in 0..params.nft_count {
        plan.transaction(
            names::MINT_NFT,
            &params.nft_minter,
            vec![address_of(host)],
            vec![Requirement::new(host, Container::NftCollection)],
        );
    }
    plan.narrate(format!(
        "Create a new FungibleToken minter with allowed amount of {} tokens",
        params.minter_allowance
    ));
    plan.transaction(
        names::NEW_DEMOTOKEN_MINTER,
        &params.token_admin,
        vec![Argument::UFix64(params.minter_allowance).into()],
        vec![],
    );
    plan.narrate("Mint tokens for the auction host and the bidders");
    for (recipient, grant) in std::iter::once((host, params.host_grant))
        .chain(bidders.iter().map(|bidder| (bidder.as_str(), params.bidder_grant)))
    {
        plan.transaction(
            names::MINT_DEMOTOKENS,
            &params.token_admin,
            vec![address_of(recipient), Argument::UFix64(grant).into()],
            vec![Requirement::new(recipient, Container::TokenVault)],
        );
    }

    plan.phase(Phase::AuctionCreation);
    plan.narrate(format!(
        "Create a new Orbital Auction: {} epochs of {} blocks",
        params.epoch_count, params.epoch_length
    ));
    plan.transaction(
        names::CREATE_AUCTION,
        host,
        vec![
            Argument::UInt64(params.epoch_count).into(),
            Argument::UInt64(params.epoch_length).into(),
        ],
        vec![
            Requirement::new(host, Container::TokenVault),
            Requirement::new(host, Container::NftCollection),
            Requirement::new(host, Container::AuctionCollection),
        ],
    );
    plan.script(names::CHECK_AUCTIONS, vec![address_of(host)]);

    plan.phase(Phase::Bidding);
    plan.narrate(format!(
        "Place {} rounds of bids from {} bidders",
        params.bid_rounds, params.bidder_count
    ));
    for _ in 0..params.bid_rounds {
        for (bidder, amount) in bidders.iter().zip(&params.bid_amounts) {
            plan.transaction(
                names::PLACE_BID,
                bidder,
                vec![
                    address_of(host),
                    auction_id(),
                    Argument::UFix64(*amount).into(),
                ],
                vec![
                    Requirement::new(bidder, Container::TokenVault),
                    Requirement::new(bidder, Container::NftCollection),
                    Requirement::new(host, Container::AuctionCollection),
                ],
            );
        }
    }
    inspect_auction(&mut plan, params, &bidders);
    plan.checkpoint("press ENTER to complete the auction");

    plan.phase(Phase::EpochAdvancement);
    for _ in 0..params.epoch_ticks {
        plan.transaction(
            names::CHECK_UPDATE_EPOCH,
            host,
            vec![auction_id()],
            vec![Requirement::new(host, Container::AuctionCollection)],
        );
    }

    plan.phase(Phase::Payout);
    let mut payout_requires = vec![
        Requirement::new(host, Container::AuctionCollection),
        Requirement::new(host, Container::TokenVault),
    ];
    for bidder in &bidders {
        payout_requires.push(Requirement::new(bidder, Container::TokenVault));
        payout_requires.push(Requirement::new(bidder, Container::NftCollection));
    }
    plan.transaction(names::PAYOUT_ORBS, host, vec![auction_id()], payout_requires);

    plan.phase(Phase::Verification);
    inspect_auction(&mut plan, params, &bidders);
    plan.verify_settlement(SettlementCheck {
        bidders: bidders.clone(),
        initial_balance: params.bidder_grant,
        bids: params.bid_amounts.clone(),
        balance_script: names::CHECK_ACCOUNT.to_string(),
    });

    let plan = plan.build();
    plan.validate()?;
    Ok(plan)
}
