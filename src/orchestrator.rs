use crate::{
    Error,
    Result,
    gateway::{
        ContractProxy,
        LedgerGateway,
        TxReceipt,
    },
    round::RoundId,
    session::{
        Action,
        ActionRequest,
    },
};
use ethers::types::Address;
use tracing::{
    info,
    warn,
};

/// Refreshes owed to the session after a confirmed action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Followup {
    pub receipt: TxReceipt,
    pub refresh_balance: bool,
    pub refresh_round: Option<RoundId>,
}

/// Submits user actions: resolve the acting account, convert the amount,
/// send the call, and report which state needs re-reading.
///
/// A failed submission leaves the session untouched. Nothing is retried.
#[derive(Clone, Debug)]
pub struct TransactionOrchestrator<L, C> {
    ledger: L,
    contract: C,
}

impl<L: LedgerGateway, C: ContractProxy> TransactionOrchestrator<L, C> {
    pub fn new(ledger: L, contract: C) -> Self {
        Self { ledger, contract }
    }

    pub async fn acting_account(&self) -> Result<Address> {
        let accounts = self.ledger.accounts().await?;
        accounts.first().copied().ok_or(Error::NoAccount)
    }

    pub async fn execute(&self, request: &ActionRequest) -> Result<Followup> {
        let account = self.acting_account().await?;
        let submitted = match request.action {
            Action::Vote(side) => {
                let amount = self.ledger.to_base_unit(&request.amount)?;
                self.contract.cast_vote(account, amount, side).await
            }
            Action::Deposit => {
                let amount = self.ledger.to_base_unit(&request.amount)?;
                self.contract.buy_credits(account, amount).await
            }
            Action::Withdraw => {
                let amount = self.ledger.to_base_unit(&request.amount)?;
                self.contract.withdraw_credits(account, amount).await
            }
            Action::Claim => self.contract.claim_earnings(account, request.round).await,
        };
        let receipt = submitted.map_err(|e| {
            let reason = match e {
                Error::TransactionFailed(reason) => reason,
                other => other.to_string(),
            };
            warn!(action = request.action.describe(), %reason, "submission failed");
            Error::TransactionFailed(reason)
        })?;
        info!(
            action = request.action.describe(),
            round = request.round,
            tx = ?receipt.tx_hash,
            "transaction confirmed"
        );
        let refresh_round = match request.action {
            Action::Vote(_) | Action::Claim => Some(request.round),
            Action::Deposit | Action::Withdraw => None,
        };
        Ok(Followup {
            receipt,
            refresh_balance: true,
            refresh_round,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        metrics::Side,
        test_helpers::FakeChain,
    };
    use ethers::types::U256;

    fn request(action: Action, amount: &str, round: RoundId) -> ActionRequest {
        ActionRequest {
            action,
            amount: amount.to_string(),
            round,
        }
    }

    #[tokio::test]
    async fn execute__no_accounts__fails_with_no_account() {
        // given
        let chain = FakeChain::without_accounts(128);
        let orchestrator = TransactionOrchestrator::new(chain.clone(), chain);

        // when
        let actual = orchestrator.execute(&request(Action::Deposit, "1", 0)).await;

        // then
        assert_eq!(Err(Error::NoAccount), actual);
    }

    #[tokio::test]
    async fn execute__deposit__refreshes_balance_only() {
        // given
        let chain = FakeChain::new(128);
        let orchestrator = TransactionOrchestrator::new(chain.clone(), chain.clone());

        // when
        let followup = orchestrator
            .execute(&request(Action::Deposit, "2", 0))
            .await
            .unwrap();

        // then
        assert!(followup.refresh_balance);
        assert_eq!(None, followup.refresh_round);
        assert_eq!(U256::from(2u64) * U256::exp10(15), chain.balance_of_player());
    }

    #[tokio::test]
    async fn execute__vote__refreshes_the_voted_round() {
        // given
        let chain = FakeChain::new(128);
        chain.set_block(300);
        chain.credit_player(U256::from(10u64) * U256::exp10(15));
        let orchestrator = TransactionOrchestrator::new(chain.clone(), chain.clone());

        // when
        let followup = orchestrator
            .execute(&request(Action::Vote(Side::Red), "4", 2))
            .await
            .unwrap();

        // then
        assert_eq!(Some(2), followup.refresh_round);
        assert_eq!(U256::from(4u64) * U256::exp10(15), chain.totals(2).red);
    }

    #[tokio::test]
    async fn execute__malformed_amount__is_invalid_input_and_submits_nothing() {
        // given
        let chain = FakeChain::new(128);
        let orchestrator = TransactionOrchestrator::new(chain.clone(), chain.clone());

        // when
        let actual = orchestrator
            .execute(&request(Action::Withdraw, "lots", 0))
            .await;

        // then
        assert!(matches!(actual, Err(Error::InvalidInput(_))));
        assert_eq!(0, chain.submissions());
    }

    #[tokio::test]
    async fn execute__rejected_submission__is_transaction_failed() {
        // given
        let chain = FakeChain::new(128);
        chain.fail_next_submission("out of gas");
        let orchestrator = TransactionOrchestrator::new(chain.clone(), chain.clone());

        // when
        let actual = orchestrator.execute(&request(Action::Deposit, "1", 0)).await;

        // then
        assert_eq!(Err(Error::TransactionFailed(String::from("out of gas"))), actual);
        assert_eq!(U256::zero(), chain.balance_of_player());
    }
}
