//! Seams to the ledger node and the game contract.
//!
//! The engine only talks to these traits; [`crate::evm`] implements them over
//! JSON-RPC and [`crate::test_helpers`] provides an in-memory chain.

use crate::{
    Error,
    Result,
    metrics::Side,
    round::RoundId,
};
use ethers::{
    types::{
        Address,
        H256,
        U256,
    },
    utils::{
        format_units,
        parse_units,
    },
};
use std::future::Future;
use tokio::sync::mpsc;

/// Decimals between one credit and the ledger's base unit (1 ETH == 1000 credits).
pub const CREDIT_DECIMALS: u32 = 15;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RawTotals {
    pub red: U256,
    pub blue: U256,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RawEarnings {
    pub reward: U256,
    pub bet: U256,
    pub claimed: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// Someone voted; the payload is informational only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NewVote {
    pub voter: Address,
    pub side: Side,
    pub block_number: Option<u64>,
}

pub trait LedgerGateway: Send + Sync {
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send;

    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Parses a credit amount typed by the user into base units.
    fn to_base_unit(&self, credits: &str) -> Result<U256> {
        credits_to_base_units(credits)
    }

    fn from_base_unit(&self, amount: U256) -> Result<f64> {
        base_units_to_credits(amount)
    }
}

pub trait ContractProxy: Send + Sync {
    fn game_totals(&self, round: RoundId)
    -> impl Future<Output = Result<RawTotals>> + Send;

    fn earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<RawEarnings>> + Send;

    fn credit_balance(&self, account: Address)
    -> impl Future<Output = Result<U256>> + Send;

    fn cast_vote(
        &self,
        account: Address,
        amount: U256,
        side: Side,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    fn buy_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    fn withdraw_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    fn claim_earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Forwards new-vote notifications into `sink` until the subscription
    /// ends or the receiver is dropped. Delivery is at-least-once.
    fn watch_new_votes(
        &self,
        sink: mpsc::UnboundedSender<NewVote>,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub fn credits_to_base_units(credits: &str) -> Result<U256> {
    let credits = credits.trim();
    if credits.is_empty() || credits.starts_with('-') {
        return Err(Error::InvalidInput(format!(
            "amount must be a non-negative number, got {credits:?}"
        )));
    }
    let parsed = parse_units(credits, CREDIT_DECIMALS).map_err(|e| {
        Error::InvalidInput(format!("cannot read amount {credits:?}: {e}"))
    })?;
    Ok(parsed.into())
}

pub fn base_units_to_credits(amount: U256) -> Result<f64> {
    let formatted = format_units(amount, CREDIT_DECIMALS)
        .map_err(|e| Error::Gateway(format!("cannot convert {amount}: {e}")))?;
    formatted
        .parse::<f64>()
        .map_err(|e| Error::Gateway(format!("cannot convert {formatted}: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn credits_to_base_units__whole_credits__scale_to_milliether() {
        let actual = credits_to_base_units("100").unwrap();

        assert_eq!(U256::from(100u64) * U256::exp10(15), actual);
    }

    #[test]
    fn credits_to_base_units__fractional_credits__are_exact() {
        let actual = credits_to_base_units(" 0.5 ").unwrap();

        assert_eq!(U256::from(5u64) * U256::exp10(14), actual);
    }

    #[test]
    fn credits_to_base_units__negative_or_garbage__is_invalid_input() {
        assert!(matches!(credits_to_base_units("-3"), Err(Error::InvalidInput(_))));
        assert!(matches!(credits_to_base_units(""), Err(Error::InvalidInput(_))));
        assert!(matches!(credits_to_base_units("ten"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn base_units_to_credits__milliether__is_one_credit() {
        let actual = base_units_to_credits(U256::exp10(15)).unwrap();

        assert_eq!(1.0, actual);
    }
}
