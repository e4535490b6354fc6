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
use ethers::types::{
    Address,
    H256,
    U256,
};
use std::{
    collections::HashMap,
    future::{
        Future,
        ready,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};
use tokio::sync::mpsc;

pub fn player() -> Address {
    Address::repeat_byte(0x11)
}

pub fn credits(n: u64) -> U256 {
    U256::from(n) * U256::exp10(crate::gateway::CREDIT_DECIMALS as usize)
}

struct ChainState {
    block_div: u64,
    block: u64,
    accounts: Vec<Address>,
    totals: HashMap<RoundId, RawTotals>,
    earnings: HashMap<RoundId, RawEarnings>,
    balances: HashMap<Address, U256>,
    totals_delay: HashMap<RoundId, Duration>,
    next_failure: Option<String>,
    submissions: usize,
    vote_sinks: Vec<mpsc::UnboundedSender<NewVote>>,
}

/// In-memory ledger and game contract with a single funded player.
///
/// Cloning shares the same chain, so a test can keep a handle while the
/// engine owns another.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new(block_div: u64) -> Self {
        Self::with_accounts(block_div, vec![player()])
    }

    pub fn without_accounts(block_div: u64) -> Self {
        Self::with_accounts(block_div, Vec::new())
    }

    fn with_accounts(block_div: u64, accounts: Vec<Address>) -> Self {
        let state = ChainState {
            block_div,
            block: 0,
            accounts,
            totals: HashMap::new(),
            earnings: HashMap::new(),
            balances: HashMap::new(),
            totals_delay: HashMap::new(),
            next_failure: None,
            submissions: 0,
            vote_sinks: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_block(&self, block: u64) {
        self.lock().block = block;
    }

    pub fn block(&self) -> u64 {
        self.lock().block
    }

    pub fn credit_player(&self, amount: U256) {
        let mut state = self.lock();
        let balance = state.balances.entry(player()).or_default();
        *balance += amount;
    }

    pub fn balance_of_player(&self) -> U256 {
        self.lock()
            .balances
            .get(&player())
            .copied()
            .unwrap_or_default()
    }

    pub fn set_totals(&self, round: RoundId, red: U256, blue: U256) {
        self.lock().totals.insert(round, RawTotals { red, blue });
    }

    pub fn totals(&self, round: RoundId) -> RawTotals {
        self.lock().totals.get(&round).copied().unwrap_or_default()
    }

    pub fn set_earnings(&self, round: RoundId, earnings: RawEarnings) {
        self.lock().earnings.insert(round, earnings);
    }

    /// Delays every totals read of `round`, to let later reads overtake it.
    pub fn delay_totals(&self, round: RoundId, delay: Duration) {
        self.lock().totals_delay.insert(round, delay);
    }

    pub fn fail_next_submission(&self, reason: impl Into<String>) {
        self.lock().next_failure = Some(reason.into());
    }

    pub fn submissions(&self) -> usize {
        self.lock().submissions
    }

    /// Notifies every live subscriber; returns how many received it.
    pub fn emit_new_vote(&self, side: Side) -> usize {
        let mut state = self.lock();
        let vote = NewVote {
            voter: player(),
            side,
            block_number: Some(state.block),
        };
        state.vote_sinks.retain(|sink| sink.send(vote).is_ok());
        state.vote_sinks.len()
    }

    fn submit(
        &self,
        apply: impl FnOnce(&mut ChainState) -> Result<()>,
    ) -> Result<TxReceipt> {
        let mut state = self.lock();
        state.submissions += 1;
        if let Some(reason) = state.next_failure.take() {
            return Err(Error::TransactionFailed(reason));
        }
        apply(&mut state)?;
        state.block += 1;
        Ok(TxReceipt {
            tx_hash: H256::from_low_u64_be(state.submissions as u64),
            block_number: Some(state.block),
        })
    }
}

fn debit(state: &mut ChainState, account: Address, amount: U256) -> Result<()> {
    let balance = state.balances.entry(account).or_default();
    if *balance < amount {
        return Err(Error::TransactionFailed(String::from("insufficient credits")));
    }
    *balance -= amount;
    Ok(())
}

impl LedgerGateway for FakeChain {
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send {
        ready(Ok(self.block()))
    }

    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send {
        ready(Ok(self.lock().accounts.clone()))
    }
}

impl ContractProxy for FakeChain {
    fn game_totals(
        &self,
        round: RoundId,
    ) -> impl Future<Output = Result<RawTotals>> + Send {
        let totals = self.totals(round);
        let delay = self.lock().totals_delay.get(&round).copied();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(totals)
        }
    }

    fn earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<RawEarnings>> + Send {
        let earnings = if account == player() {
            self.lock().earnings.get(&round).copied().unwrap_or_default()
        } else {
            RawEarnings::default()
        };
        ready(Ok(earnings))
    }

    fn credit_balance(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<U256>> + Send {
        let balance = self
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default();
        ready(Ok(balance))
    }

    fn cast_vote(
        &self,
        account: Address,
        amount: U256,
        side: Side,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        let receipt = self.submit(|state| {
            debit(state, account, amount)?;
            let round = state.block / state.block_div;
            let totals = state.totals.entry(round).or_default();
            match side {
                Side::Red => totals.red += amount,
                Side::Blue => totals.blue += amount,
            }
            if account == player() {
                state.earnings.entry(round).or_default().bet += amount;
            }
            Ok(())
        });
        if receipt.is_ok() {
            self.emit_new_vote(side);
        }
        ready(receipt)
    }

    fn buy_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        ready(self.submit(|state| {
            *state.balances.entry(account).or_default() += amount;
            Ok(())
        }))
    }

    fn withdraw_credits(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        ready(self.submit(|state| debit(state, account, amount)))
    }

    fn claim_earnings(
        &self,
        account: Address,
        round: RoundId,
    ) -> impl Future<Output = Result<TxReceipt>> + Send {
        ready(self.submit(|state| {
            let earnings = state.earnings.entry(round).or_default();
            if earnings.claimed {
                return Err(Error::TransactionFailed(String::from("already claimed")));
            }
            if earnings.reward.is_zero() {
                return Err(Error::TransactionFailed(String::from("nothing to claim")));
            }
            earnings.claimed = true;
            let reward = earnings.reward;
            *state.balances.entry(account).or_default() += reward;
            Ok(())
        }))
    }

    fn watch_new_votes(
        &self,
        sink: mpsc::UnboundedSender<NewVote>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.lock().vote_sinks.push(sink.clone());
        async move {
            sink.closed().await;
            Ok(())
        }
    }
}
