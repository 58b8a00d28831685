//! Post-payout settlement checks.
//!
//! The driver has no view into the auction contract, so settlement is
//! judged from the outside: losing bidders must be back at their grant and
//! the winner must be short by at least the winning bid. Mismatches become
//! [`Finding`]s in the report instead of aborting the run.

use crate::cadence::UFix64;
use crate::tooling::ScriptOutput;
use std::fmt;

/// Balances to expect once the auction has paid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCheck {
    /// Bidder accounts in bid order
    pub bidders: Vec<String>,
    /// Balance every bidder held before bidding
    pub initial_balance: UFix64,
    /// Per-round bid of each bidder, parallel to `bidders`
    pub bids: Vec<UFix64>,
    /// Script that reports an account's balance, called with its address
    pub balance_script: String,
}

impl SettlementCheck {
    /// Index of the highest bidder; on a tie the earliest bidder wins
    pub fn winner(&self) -> Option<usize> {
        self.bids
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, UFix64)>, (index, bid)| match best {
                Some((_, top)) if top >= *bid => best,
                _ => Some((index, *bid)),
            })
            .map(|(index, _)| index)
    }

    /// Balances of a clean settlement: losers hold their grant and the
    /// winner is short by exactly the winning bid
    pub fn expected_balances(&self) -> Vec<(String, UFix64)> {
        let winner = self.winner();
        self.bidders
            .iter()
            .enumerate()
            .map(|(index, bidder)| {
                let balance = match (Some(index) == winner, self.bids.get(index)) {
                    (true, Some(bid)) => self.initial_balance.saturating_sub(*bid),
                    _ => self.initial_balance,
                };
                (bidder.clone(), balance)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    LoserNotRefunded {
        bidder: String,
        expected: UFix64,
        actual: UFix64,
    },
    WinnerNotCharged {
        bidder: String,
        bid: UFix64,
        initial: UFix64,
        actual: UFix64,
    },
    BalanceUnreadable {
        bidder: String,
    },
    MalformedCheck(String),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::LoserNotRefunded {
                bidder,
                expected,
                actual,
            } => write!(
                f,
                "{} lost the auction but holds {} instead of {}",
                bidder, actual, expected
            ),
            Finding::WinnerNotCharged {
                bidder,
                bid,
                initial,
                actual,
            } => write!(
                f,
                "{} won with {} but still holds {} of {}",
                bidder, bid, actual, initial
            ),
            Finding::BalanceUnreadable { bidder } => {
                write!(f, "balance of {} could not be read", bidder)
            }
            Finding::MalformedCheck(reason) => write!(f, "settlement check is malformed: {}", reason),
        }
    }
}

/// Compare observed balances, parallel to `check.bidders`, with the expected settlement
pub fn evaluate_settlement(check: &SettlementCheck, balances: &[Option<UFix64>]) -> Vec<Finding> {
    if check.bidders.len() != check.bids.len() {
        return vec![Finding::MalformedCheck(format!(
            "{} bidders but {} bids",
            check.bidders.len(),
            check.bids.len()
        ))];
    }
    if balances.len() != check.bidders.len() {
        return vec![Finding::MalformedCheck(format!(
            "{} bidders but {} balances",
            check.bidders.len(),
            balances.len()
        ))];
    }

    let winner = check.winner();
    let mut findings = Vec::new();

    for (index, (bidder, balance)) in check.bidders.iter().zip(balances).enumerate() {
        let Some(actual) = *balance else {
            findings.push(Finding::BalanceUnreadable {
                bidder: bidder.clone(),
            });
            continue;
        };

        if Some(index) == winner {
            let bid = check.bids[index];
            let charged = actual
                .checked_add(bid)
                .is_some_and(|restored| restored <= check.initial_balance);
            if !charged {
                findings.push(Finding::WinnerNotCharged {
                    bidder: bidder.clone(),
                    bid,
                    initial: check.initial_balance,
                    actual,
                });
            }
        } else if actual != check.initial_balance {
            findings.push(Finding::LoserNotRefunded {
                bidder: bidder.clone(),
                expected: check.initial_balance,
                actual,
            });
        }
    }

    findings
}

/// Balance reported by a balance script.
///
/// Accepts a bare UFix64, a composite or dictionary with a `balance` member,
/// or plain decimal text.
pub fn extract_balance(output: &ScriptOutput) -> Option<UFix64> {
    output
        .value
        .as_ref()
        .and_then(|value| value.as_ufix64().or_else(|| value.find_ufix64("balance")))
        .or_else(|| output.raw.trim().parse().ok())
}
