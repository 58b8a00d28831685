//! # Orbital Auction demo driver
//!
//! Sequences the Orbital Auction walkthrough against a Flow emulator:
//! contract deployment, account provisioning, token and NFT distribution,
//! auction creation, bidding, epoch advancement, payout and settlement
//! checks. All chain access goes through the [`tooling::FlowTooling`]
//! trait, backed by the `flow` CLI in production and by
//! [`tooling::RecordingTooling`] for dry runs and tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orbital_driver::executor::Executor;
//! use orbital_driver::plan::{orbital_plan, DemoParams};
//! use orbital_driver::tooling::RecordingTooling;
//! use std::sync::Arc;
//!
//! let plan = orbital_plan(&DemoParams::default())?;
//! let report = Executor::new(Arc::new(RecordingTooling::new()))
//!     .execute(&plan)
//!     .await?;
//! report.print();
//! ```

pub mod cadence;
pub mod config;
pub mod executor;
pub mod logger;
pub mod orchestrator;
pub mod plan;
pub mod scenarios;
pub mod tooling;
pub mod verification;

/// Convenience re-exports
pub mod prelude {
    pub use crate::cadence::{Address, Argument, CadenceValue, UFix64};
    pub use crate::executor::{DriverError, ExecutionReport, Executor};
    pub use crate::orchestrator::{Clock, Pacing, PausedClock, SystemClock};
    pub use crate::plan::{orbital_plan, DemoParams, Phase, Plan, PlanBuilder};
    pub use crate::tooling::{FlowCli, FlowTooling, RecordingTooling};
    pub use crate::verification::{Finding, SettlementCheck};
}
