//! JSON-RPC implementation of the gateway traits for the deployed RedVsBlue
//! contract.

use crate::{
    Error,
    Result,
    gateway::{
        ContractProxy,
        LedgerGateway,
        NewVote,
        RawEarnings,
        RawTotals,
        TxReceipt,
    },
    metrics::Side,
    round::RoundId,
};
use ethers::{
    abi::Detokenize,
    contract::{
        ContractCall,
        abigen,
    },
    prelude::*,
};
use futures::StreamExt;
use std::{
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    warn,
};

abigen!(
    RedVsBlue,
    r#"[
        event NewVoteCast(address indexed voter, uint256 amount, bool isBlue)
        function GetGameTotals(uint256 roundId) external view returns (uint256, uint256)
        function GetEarnings(uint256 roundId) external view returns (uint256, uint256, bool)
        function GetCreditBalance() external view returns (uint256)
        function CastVote(uint256 amount, bool isBlue) external
        function BuyCredits() external payable
        function WithdrawCredits(uint256 amount) external
        function ClaimEarnings(uint256 roundId) external
    ]"#
);

pub fn connect(rpc_url: &str, poll_interval: Duration) -> Result<Provider<Http>> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .map_err(|e| Error::Gateway(format!("invalid rpc url {rpc_url}: {e}")))?;
    Ok(provider.interval(poll_interval))
}

pub async fn chain_id<M: Middleware>(client: &M) -> Result<u64> {
    let id = client
        .get_chainid()
        .await
        .map_err(|e| Error::Gateway(format!("reading chain id failed: {e}")))?;
    Ok(id.as_u64())
}

/// Ledger and contract access through one middleware stack.
///
/// With a local signer the signer's address is the only account; otherwise
/// the node's unlocked accounts are used and the node signs.
#[derive(Debug)]
pub struct EvmGateway<M> {
    client: Arc<M>,
    contract: RedVsBlue<M>,
    signer: Option<Address>,
}

impl<M> Clone for EvmGateway<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            contract: self.contract.clone(),
            signer: self.signer,
        }
    }
}

impl<M: Middleware + 'static> EvmGateway<M> {
    pub fn new(client: Arc<M>, address: Address, signer: Option<Address>) -> Self {
        let contract = RedVsBlue::new(address, client.clone());
        Self {
            client,
            contract,
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

fn read_failed(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Gateway(format!("{what} failed: {e}"))
}

async fn submit<M, D>(call: ContractCall<M, D>, what: &'static str) -> Result<TxReceipt>
where
    M: Middleware + 'static,
    D: Detokenize,
{
    let pending = call
        .send()
        .await
        .map_err(|e| Error::TransactionFailed(format!("{what}: {e}")))?;
    let tx_hash = pending.tx_hash();
    debug!(what, ?tx_hash, "transaction sent");
    let receipt = pending
        .await
        .map_err(|e| Error::TransactionFailed(format!("{what}: {e}")))?
        .ok_or_else(|| Error::TransactionFailed(format!("{what}: dropped from mempool")))?;
    if receipt.status == Some(U64::zero()) {
        return Err(Error::TransactionFailed(format!("{what}: reverted")));
    }
    Ok(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|n| n.as_u64()),
    })
}

impl<M: Middleware + 'static> LedgerGateway for EvmGateway<M> {
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send {
        let client = self.client.clone();
        async move {
            let block = client
                .get_block_number()
                .await
                .map_err(|e| read_failed("block number", e))?;
            Ok(block.as_u64())
        }
    }

    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send {
        let client = self.client.clone();
        let signer = self.signer;
        async move {
            if let Some(signer) = signer {
                return Ok(vec![signer]);
            }
            client
                .get_accounts()
                .await
                .map_err(|e| read_failed("account listing", e))
        }
    }
}

impl<M: Middleware + 'static> ContractProxy for EvmGateway<M> {
    fn game_totals(
        &self,
        round: RoundId,
    ) -> impl Future<Output = Result<RawTotals>> + Send {
        let call = self.contract.get_game_totals(U256::from(round));
        async move {
            let (red, blue) = call.call().await.map_err(|e| read_failed("GetGameTotals", e))?;
            Ok(RawTotals { red, blue })
        }
    }

    fn earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<RawEarnings>> + Send {
        let call = self.contract.get_earnings(U256::from(round)).from(account);
        async move {
            let (reward, bet, claimed) =
                call.call().await.map_err(|e| read_failed("GetEarnings", e))?;
            Ok(RawEarnings {
                reward,
                bet,
                claimed,
            })
        }
    }

    fn credit_balance(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<U256>> + Send {
        let call = self.contract.get_credit_balance().from(account);
        async move {
            call.call()
                .await
                .map_err(|e| read_failed("GetCreditBalance", e))
        }
    }

    fn cast_vote(
        &self,
        account: Address,
        amount: U256,
        side: Side,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        let call = self.contract.cast_vote(amount, side.is_blue()).from(account);
        submit(call, "CastVote")
    }

    fn buy_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        let call = self.contract.buy_credits().from(account).value(amount);
        submit(call, "BuyCredits")
    }

    fn withdraw_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        let call = self.contract.withdraw_credits(amount).from(account);
        submit(call, "WithdrawCredits")
    }

    fn claim_earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        let call = self.contract.claim_earnings(U256::from(round)).from(account);
        submit(call, "ClaimEarnings")
    }

    fn watch_new_votes(
        &self,
        sink: mpsc::UnboundedSender<NewVote>,
    ) -> impl Future<Output = Result<()>> + Send {
        let event = self.contract.event::<NewVoteCastFilter>();
        async move {
            let mut stream = event
                .stream_with_meta()
                .await
                .map_err(|e| read_failed("NewVoteCast subscription", e))?;
            loop {
                tokio::select! {
                    _ = sink.closed() => break,
                    item = stream.next() => {
                        let Some(item) = item else {
                            break;
                        };
                        let (vote, meta) = match item {
                            Ok(found) => found,
                            Err(e) => {
                                warn!(error = %e, "undecodable NewVoteCast log");
                                continue;
                            }
                        };
                        let side = if vote.is_blue { Side::Blue } else { Side::Red };
                        let notification = NewVote {
                            voter: vote.voter,
                            side,
                            block_number: Some(meta.block_number.as_u64()),
                        };
                        if sink.send(notification).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
