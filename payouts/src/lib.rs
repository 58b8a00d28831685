//! Orb payout weights.
//!
//! At payout the auction splits an epoch's orbs over the divisors of the
//! epoch number: divisor `d` of `n` receives `d / sigma(n)`, where
//! `sigma(n)` is the sum of all divisors of `n`. The weights of one epoch
//! therefore sum to 1.

use actix_web::{web, HttpResponse};
use log::debug;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Largest epoch accepted by the service unless configured otherwise
pub const DEFAULT_MAX_EPOCH: u64 = 1_000_000;

/// Hard ceiling for the configured maximum; divisor search is O(sqrt(n))
pub const MAX_EPOCH_LIMIT: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutWeight {
    pub token: u64,
    pub weight: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("epoch must be a non-negative integer, got '{0}'")]
    InvalidEpoch(String),

    #[error("epoch {epoch} is above the maximum of {max}")]
    EpochTooLarge { epoch: u64, max: u64 },

    #[error("sum of the divisors of {0} does not fit in 64 bits")]
    Overflow(u64),
}

/// Divisors of `n` in ascending order; empty for 0
pub fn divisors(n: u64) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }

    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i = 1;
    while i <= n / i {
        if n % i == 0 {
            low.push(i);
            if i != n / i {
                high.push(n / i);
            }
        }
        i += 1;
    }
    low.extend(high.into_iter().rev());
    low
}

/// `sigma(n)` by prime factorisation: the product of `1 + p + ... + p^k`
/// over every prime power `p^k` dividing `n`. `None` when it does not fit
/// in a `u64`.
pub fn sum_of_divisors(n: u64) -> Option<u64> {
    if n == 0 {
        return Some(0);
    }

    let mut remaining = n;
    let mut sum: u64 = 1;
    let mut p = 2;
    while p <= remaining / p {
        let mut term: u64 = 1;
        let mut factor_sum: u64 = 1;
        while remaining % p == 0 {
            remaining /= p;
            term *= p;
            factor_sum = factor_sum.checked_add(term)?;
        }
        sum = sum.checked_mul(factor_sum)?;
        p += 1;
    }
    if remaining > 1 {
        sum = sum.checked_mul(remaining.checked_add(1)?)?;
    }
    Some(sum)
}

pub fn payout_weights(n: u64) -> Result<Vec<PayoutWeight>, PayoutError> {
    let sigma = sum_of_divisors(n).ok_or(PayoutError::Overflow(n))? as f64;
    Ok(divisors(n)
        .into_iter()
        .map(|token| PayoutWeight {
            token,
            weight: token as f64 / sigma,
        })
        .collect())
}

/// Parse a path segment into an epoch no larger than `max`, itself capped
/// at [`MAX_EPOCH_LIMIT`]
pub fn parse_epoch(raw: &str, max: u64) -> Result<u64, PayoutError> {
    let max = max.min(MAX_EPOCH_LIMIT);
    let epoch: u64 = raw
        .trim()
        .parse()
        .map_err(|_| PayoutError::InvalidEpoch(raw.to_string()))?;
    if epoch > max {
        return Err(PayoutError::EpochTooLarge { epoch, max });
    }
    Ok(epoch)
}

#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    pub max_epoch: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_epoch: DEFAULT_MAX_EPOCH,
        }
    }
}

pub async fn handle_payouts(config: web::Data<ApiConfig>, path: web::Path<String>) -> HttpResponse {
    let raw = path.into_inner();
    match parse_epoch(&raw, config.max_epoch).and_then(|epoch| {
        payout_weights(epoch).map(|weights| (epoch, weights))
    }) {
        Ok((epoch, weights)) => {
            debug!("Epoch {} pays out over {} tokens", epoch, weights.len());
            HttpResponse::Ok().json(weights)
        }
        Err(err) => HttpResponse::BadRequest().json(json!({ "error": err.to_string() })),
    }
}

pub async fn handle_health() -> HttpResponse {
    HttpResponse::Ok().body("OK\n")
}

/// Register the service routes on an app or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handle_health))
        .route("/payouts/{epoch}", web::get().to(handle_payouts));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisors() {
        assert_eq!(divisors(0), Vec::<u64>::new());
        assert_eq!(divisors(1), vec![1]);
        assert_eq!(divisors(12), vec![1, 2, 3, 4, 6, 12]);
        assert_eq!(divisors(16), vec![1, 2, 4, 8, 16]);
        assert_eq!(divisors(13), vec![1, 13]);
    }

    #[test]
    fn test_sum_of_divisors_matches_divisor_list() {
        for n in 1..=500 {
            assert_eq!(sum_of_divisors(n), Some(divisors(n).iter().sum::<u64>()), "n = {}", n);
        }
        assert_eq!(sum_of_divisors(0), Some(0));
        assert_eq!(sum_of_divisors(28), Some(56));
        assert_eq!(sum_of_divisors(MAX_EPOCH_LIMIT), Some(8_191 * 305_175_781));
    }

    #[test]
    fn test_weights_sum_to_one() {
        for n in [1, 2, 6, 8, 15, 360, 997] {
            let total: f64 = payout_weights(n).unwrap().iter().map(|w| w.weight).sum();
            assert!((total - 1.0).abs() < 1e-12, "n = {}: {}", n, total);
        }

        let weights = payout_weights(6).unwrap();
        assert_eq!(weights[0], PayoutWeight { token: 1, weight: 1.0 / 12.0 });
        assert_eq!(weights[3], PayoutWeight { token: 6, weight: 0.5 });
    }

    #[test]
    fn test_parse_epoch() {
        assert_eq!(parse_epoch("8", 10), Ok(8));
        assert_eq!(
            parse_epoch("eight", 10),
            Err(PayoutError::InvalidEpoch("eight".to_string()))
        );
        assert_eq!(parse_epoch("-1", 10), Err(PayoutError::InvalidEpoch("-1".to_string())));
        assert_eq!(
            parse_epoch("11", 10),
            Err(PayoutError::EpochTooLarge { epoch: 11, max: 10 })
        );
        assert_eq!(
            parse_epoch("18446744073709551615", u64::MAX),
            Err(PayoutError::EpochTooLarge {
                epoch: u64::MAX,
                max: MAX_EPOCH_LIMIT,
            })
        );
    }

    #[test]
    fn test_sigma_overflow_is_reported() {
        assert_eq!(sum_of_divisors(u64::MAX), None);
        assert_eq!(payout_weights(u64::MAX), Err(PayoutError::Overflow(u64::MAX)));
    }
}
