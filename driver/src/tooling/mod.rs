//! The external tooling surface the driver talks to.
//!
//! Everything the demo does to the chain goes through [`FlowTooling`]:
//! contract deployment, account creation, address lookup, transactions and
//! read-only scripts. The driver never interprets what a transaction does;
//! it only sequences calls and inspects receipts.

/// `flow` CLI backed implementation
pub mod flow_cli;

/// In-process stand-in that records every call
pub mod recording;

pub use flow_cli::{CommandOutput, CommandRunner, FlowCli, FlowCliConfig, ProcessRunner};
pub use recording::{Invocation, RecordingTooling};

use crate::cadence::{Address, Argument, CadenceError, CadenceValue};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: String,
        stderr: String,
    },

    #[error("transaction '{name}' signed by '{signer}' failed: {reason}")]
    TransactionFailed {
        name: String,
        signer: String,
        reason: String,
    },

    #[error("script '{name}' failed: {reason}")]
    ScriptFailed { name: String, reason: String },

    #[error("contract '{contract}' could not be deployed: {reason}")]
    DeploymentFailed { contract: String, reason: String },

    #[error("account '{0}' is not known to the tooling")]
    UnknownAccount(String),

    #[error("account '{0}' already exists")]
    AccountExists(String),

    #[error("unexpected output from '{command}': {reason}")]
    MalformedOutput { command: String, reason: String },

    #[error("project file '{path}': {reason}")]
    Project { path: String, reason: String },

    #[error(transparent)]
    Cadence(#[from] CadenceError),
}

/// Flow transaction status as reported by the access node
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Unknown,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

impl TransactionStatus {
    /// Accepts both the textual (`"SEALED"`) and numeric (`4`) encodings
    pub fn from_json(value: &serde_json::Value) -> Self {
        if let Some(code) = value.as_u64() {
            return match code {
                1 => Self::Pending,
                2 => Self::Finalized,
                3 => Self::Executed,
                4 => Self::Sealed,
                5 => Self::Expired,
                _ => Self::Unknown,
            };
        }

        let text = value.as_str().unwrap_or_default().to_ascii_uppercase();
        match text.trim_start_matches("TRANSACTION_STATUS_") {
            "PENDING" => Self::Pending,
            "FINALIZED" => Self::Finalized,
            "EXECUTED" => Self::Executed,
            "SEALED" => Self::Sealed,
            "EXPIRED" => Self::Expired,
            _ => Self::Unknown,
        }
    }
}

/// Result of a submitted transaction once the tooling stopped waiting on it
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReceipt {
    pub id: String,
    pub status: TransactionStatus,
    pub error: Option<String>,
    /// Event type identifiers emitted by the transaction
    pub events: Vec<String>,
}

impl TransactionReceipt {
    pub fn sealed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TransactionStatus::Sealed,
            error: None,
            events: Vec::new(),
        }
    }

    /// Sealed and free of execution errors
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Sealed && self.error.is_none()
    }
}

/// Output of a read-only script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutput {
    /// Text as printed by the tooling
    pub raw: String,
    /// Decoded value, when the output was JSON-Cadence
    pub value: Option<CadenceValue>,
}

impl fmt::Display for ScriptOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "{}", self.raw),
        }
    }
}

/// Contract surface of the external tooling client.
///
/// Every call is a blocking round-trip from the driver's point of view:
/// the driver awaits it before issuing the next one.
#[async_trait]
pub trait FlowTooling: Send + Sync {
    /// Publish the named contract to the account of the same name
    async fn deploy_contract(&self, contract: &str) -> Result<(), ToolingError>;

    /// Provision a new named account and return its address
    async fn create_account(&self, account: &str) -> Result<Address, ToolingError>;

    /// Resolve a logical account name to its network address
    async fn find_address(&self, account: &str) -> Result<Address, ToolingError>;

    /// Submit a named transaction with ordered typed arguments
    async fn send_transaction_with_arguments(
        &self,
        name: &str,
        signer: &str,
        args: &[Argument],
    ) -> Result<TransactionReceipt, ToolingError>;

    /// Submit a named transaction that takes no arguments
    async fn send_transaction(
        &self,
        name: &str,
        signer: &str,
    ) -> Result<TransactionReceipt, ToolingError> {
        self.send_transaction_with_arguments(name, signer, &[])
            .await
    }

    /// Execute a read-only script
    async fn run_script(&self, name: &str, args: &[Argument])
        -> Result<ScriptOutput, ToolingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_json() {
        assert_eq!(TransactionStatus::from_json(&json!("SEALED")), TransactionStatus::Sealed);
        assert_eq!(
            TransactionStatus::from_json(&json!("TRANSACTION_STATUS_EXPIRED")),
            TransactionStatus::Expired
        );
        assert_eq!(TransactionStatus::from_json(&json!(4)), TransactionStatus::Sealed);
        assert_eq!(TransactionStatus::from_json(&json!(2)), TransactionStatus::Finalized);
        assert_eq!(TransactionStatus::from_json(&json!(null)), TransactionStatus::Unknown);
        assert_eq!(TransactionStatus::Sealed.to_string(), "SEALED");
    }

    #[test]
    fn test_receipt_success() {
        let receipt = TransactionReceipt::sealed("abc");
        assert!(receipt.is_success());

        let failed = TransactionReceipt {
            error: Some("panic: insufficient balance".to_string()),
            ..receipt.clone()
        };
        assert!(!failed.is_success());

        let pending = TransactionReceipt {
            status: TransactionStatus::Pending,
            ..receipt
        };
        assert!(!pending.is_success());
    }
}
