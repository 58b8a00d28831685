//! YAML scenario DSL
//!
//! A scenario is a named list of steps that compiles into a [`Plan`].
//! Numbers that could lose precision are written as strings
//! (`"100000.0"`, not `100000.0`).
//!
//! ## Example Scenario
//!
//! ```yaml
//! name: "Two Bidders"
//! description: "Smallest auction that still has a loser"
//! steps:
//!   - action: phase
//!     name: deployment
//!   - action: deploy
//!     contract: Auction
//!   - action: phase
//!     name: provisioning
//!   - action: provision
//!     account: Auction
//!     container: auction_collection
//!   - action: create_account
//!     account: Bidder1
//!   - action: provision
//!     account: Bidder1
//!     container: token_vault
//!   - action: phase
//!     name: bidding
//!   - action: repeat
//!     times: 3
//!     steps:
//!       - action: send_transaction
//!         name: bid/place_bid
//!         signer: Bidder1
//!         args:
//!           - address: Auction
//!           - uint64: "1"
//!           - ufix64: "60.0"
//!         requires:
//!           - account: Bidder1
//!             container: token_vault
//!   - action: run_script
//!     name: check_account
//!     args:
//!       - address: Bidder1
//! ```
//!
//! [`Plan`]: crate::plan::Plan

pub mod compiler;
pub mod parser;

pub use parser::{load_scenario, parse_scenario, ArgSpec, Scenario, ScenarioStep};

use crate::plan::PlanError;
use thiserror::Error;

/// The earlier, argument-free demo walkthrough
pub const LEGACY_DEMO: &str = include_str!("../../scenarios/legacy_demo.yaml");

/// A reduced orbital run: two bidders, short epochs
pub const ORBITAL_SHORT: &str = include_str!("../../scenarios/orbital_short.yaml");

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("repeat block needs times >= 1, got {0}")]
    InvalidRepeat(u32),

    #[error("repeat blocks nest deeper than {0} levels")]
    TooDeep(usize),

    #[error("scenario expands to more than {0} steps")]
    TooLarge(usize),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
