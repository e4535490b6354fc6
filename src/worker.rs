use crate::{
    Error,
    Result,
    gateway::{
        ContractProxy,
        LedgerGateway,
        NewVote,
    },
    metrics::{
        Earnings,
        GameTotals,
    },
    orchestrator::{
        Followup,
        TransactionOrchestrator,
    },
    reconciler::{
        BalanceTicket,
        FetchTicket,
    },
    session::ActionRequest,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    warn,
};

/// Why a block number was read; decides which transition it feeds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockPurpose {
    Poll,
    NewVote,
    Latest,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerCommand {
    ReadBlock(BlockPurpose),
    Refresh(FetchTicket),
    RefreshBalance(BalanceTicket),
    Submit(ActionRequest),
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Block {
        purpose: BlockPurpose,
        block: u64,
    },
    Totals {
        ticket: FetchTicket,
        totals: GameTotals,
    },
    Earnings {
        ticket: FetchTicket,
        earnings: Earnings,
    },
    Balance {
        ticket: BalanceTicket,
        balance: f64,
    },
    Submitted {
        request: ActionRequest,
        result: Result<Followup>,
    },
}

struct Backend<L, C> {
    ledger: L,
    contract: C,
    orchestrator: TransactionOrchestrator<L, C>,
}

impl<L: LedgerGateway, C: ContractProxy> Backend<L, C> {
    async fn read_totals(&self, ticket: FetchTicket) -> Result<GameTotals> {
        let raw = self.contract.game_totals(ticket.round).await?;
        Ok(GameTotals::new(
            self.ledger.from_base_unit(raw.red)?,
            self.ledger.from_base_unit(raw.blue)?,
        ))
    }

    async fn read_earnings(&self, ticket: FetchTicket) -> Result<Earnings> {
        let account = self.orchestrator.acting_account().await?;
        let raw = self.contract.earnings(account, ticket.round).await?;
        Ok(Earnings {
            reward: self.ledger.from_base_unit(raw.reward)?,
            bet: self.ledger.from_base_unit(raw.bet)?,
            claimed: raw.claimed,
        })
    }

    async fn read_balance(&self) -> Result<f64> {
        let account = self.orchestrator.acting_account().await?;
        let raw = self.contract.credit_balance(account).await?;
        self.ledger.from_base_unit(raw)
    }
}

/// Runs every ledger read and submission off the app loop.
///
/// Each request becomes its own task, so results may come back in any order;
/// they carry the ticket they were issued with. Failed reads are logged and
/// dropped. The worker also reads the block number every `poll_interval` and
/// whenever the contract reports a new vote.
pub async fn refresh_worker<L, C>(
    poll_interval: Duration,
    ledger: L,
    contract: C,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) -> Result<()>
where
    L: LedgerGateway + Clone + 'static,
    C: ContractProxy + Clone + 'static,
{
    let backend = Arc::new(Backend {
        orchestrator: TransactionOrchestrator::new(ledger.clone(), contract.clone()),
        ledger,
        contract,
    });

    let (vote_tx, mut vote_rx) = mpsc::unbounded_channel::<NewVote>();
    let watcher = spawn_vote_watcher(backend.contract.clone(), vote_tx);

    let mut votes_open = true;
    let mut ticker = time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                spawn_block_read(&backend, BlockPurpose::Poll, &event_tx);
            }
            vote = vote_rx.recv(), if votes_open => {
                match vote {
                    Some(vote) => {
                        debug!(side = %vote.side, block = ?vote.block_number, "new vote cast");
                        spawn_block_read(&backend, BlockPurpose::NewVote, &event_tx);
                    }
                    None => votes_open = false,
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    WorkerCommand::ReadBlock(purpose) => {
                        spawn_block_read(&backend, purpose, &event_tx);
                    }
                    WorkerCommand::Refresh(ticket) => {
                        spawn_round_reads(&backend, ticket, &event_tx);
                    }
                    WorkerCommand::RefreshBalance(ticket) => {
                        spawn_balance_read(&backend, ticket, &event_tx);
                    }
                    WorkerCommand::Submit(request) => {
                        spawn_submission(&backend, request, &event_tx);
                    }
                    WorkerCommand::Shutdown => break,
                }
            }
        }
        if event_tx.is_closed() {
            break;
        }
    }
    watcher.abort();
    Ok(())
}

fn spawn_vote_watcher<C: ContractProxy + 'static>(
    contract: C,
    vote_tx: mpsc::UnboundedSender<NewVote>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = contract.watch_new_votes(vote_tx).await {
            warn!(error = %e, "new vote subscription ended");
        }
    })
}

fn spawn_block_read<L, C>(
    backend: &Arc<Backend<L, C>>,
    purpose: BlockPurpose,
    event_tx: &mpsc::UnboundedSender<WorkerEvent>,
) where
    L: LedgerGateway + 'static,
    C: ContractProxy + 'static,
{
    let backend = backend.clone();
    let event_tx = event_tx.clone();
    tokio::spawn(async move {
        match backend.ledger.block_number().await {
            Ok(block) => {
                let _ = event_tx.send(WorkerEvent::Block { purpose, block });
            }
            Err(e) => warn!(?purpose, error = %e, "block number read failed"),
        }
    });
}

fn spawn_round_reads<L, C>(
    backend: &Arc<Backend<L, C>>,
    ticket: FetchTicket,
    event_tx: &mpsc::UnboundedSender<WorkerEvent>,
) where
    L: LedgerGateway + 'static,
    C: ContractProxy + 'static,
{
    let totals_backend = backend.clone();
    let totals_tx = event_tx.clone();
    tokio::spawn(async move {
        match totals_backend.read_totals(ticket).await {
            Ok(totals) => {
                let _ = totals_tx.send(WorkerEvent::Totals { ticket, totals });
            }
            Err(e) => warn!(round = ticket.round, seq = ticket.seq, error = %e, "totals fetch failed"),
        }
    });

    let earnings_backend = backend.clone();
    let earnings_tx = event_tx.clone();
    tokio::spawn(async move {
        match earnings_backend.read_earnings(ticket).await {
            Ok(earnings) => {
                let _ = earnings_tx.send(WorkerEvent::Earnings { ticket, earnings });
            }
            Err(Error::NoAccount) => {
                debug!(round = ticket.round, "no account, earnings not fetched")
            }
            Err(e) => warn!(round = ticket.round, seq = ticket.seq, error = %e, "earnings fetch failed"),
        }
    });
}

fn spawn_balance_read<L, C>(
    backend: &Arc<Backend<L, C>>,
    ticket: BalanceTicket,
    event_tx: &mpsc::UnboundedSender<WorkerEvent>,
) where
    L: LedgerGateway + 'static,
    C: ContractProxy + 'static,
{
    let backend = backend.clone();
    let event_tx = event_tx.clone();
    tokio::spawn(async move {
        match backend.read_balance().await {
            Ok(balance) => {
                let _ = event_tx.send(WorkerEvent::Balance { ticket, balance });
            }
            Err(Error::NoAccount) => debug!("no account, balance not fetched"),
            Err(e) => warn!(seq = ticket.seq, error = %e, "balance fetch failed"),
        }
    });
}

fn spawn_submission<L, C>(
    backend: &Arc<Backend<L, C>>,
    request: ActionRequest,
    event_tx: &mpsc::UnboundedSender<WorkerEvent>,
) where
    L: LedgerGateway + 'static,
    C: ContractProxy + 'static,
{
    let backend = backend.clone();
    let event_tx = event_tx.clone();
    tokio::spawn(async move {
        let result = backend.orchestrator.execute(&request).await;
        let _ = event_tx.send(WorkerEvent::Submitted { request, result });
    });
}
