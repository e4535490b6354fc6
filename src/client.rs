use crate::{
    config::AppConfig,
    ui,
    wallets,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::{
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::Signer,
    types::Address,
};
use red_vs_blue::{
    deployment::{
        DeploymentRecord,
        DeploymentStore,
    },
    evm::{
        self,
        EvmGateway,
    },
    gateway::{
        ContractProxy,
        LedgerGateway,
    },
    metrics::RoundMetrics,
    session::{
        Action,
        Session,
    },
    state::ViewState,
    worker::{
        self,
        BlockPurpose,
        WorkerCommand,
        WorkerEvent,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 50;
const MAX_AMOUNT_LEN: usize = 16;

/// Everything the renderer needs, detached from the session.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSnapshot {
    pub contract: Address,
    pub view: Option<ViewState>,
    pub blocks_left: Option<u64>,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub metrics: RoundMetrics,
    pub credit_balance: f64,
    pub tx_amount: String,
    pub submitting: usize,
    pub status: String,
    pub errors: Vec<String>,
}

#[derive(Debug, PartialEq)]
pub enum Control {
    Continue(Vec<WorkerCommand>),
    Quit,
}

pub struct AppController {
    session: Session,
    contract: Address,
    submitting: usize,
    status: String,
    errors: Vec<String>,
}

impl AppController {
    pub fn new(session: Session, contract: Address) -> Self {
        Self {
            session,
            contract,
            submitting: 0,
            status: String::from("Waiting for the first block..."),
            errors: Vec::new(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let view = self.session.view().copied();
        let blocks_left =
            view.map(|v| self.session.index().blocks_left(v.blocks_elapsed()));
        AppSnapshot {
            contract: self.contract,
            view,
            blocks_left,
            can_go_previous: self.session.can_go_previous(),
            can_go_next: self.session.can_go_next(),
            metrics: self.session.metrics().clone(),
            credit_balance: self.session.account().credit_balance(),
            tx_amount: self.session.account().pending_tx_amount().to_string(),
            submitting: self.submitting,
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn on_worker_event(&mut self, event: WorkerEvent) -> Vec<WorkerCommand> {
        match event {
            WorkerEvent::Block { purpose, block } => {
                let first = self.session.view().is_none();
                let ticket = match purpose {
                    BlockPurpose::Poll | BlockPurpose::NewVote => self.session.observe(block),
                    BlockPurpose::Latest => self.session.go_to_latest(block),
                };
                let mut commands = vec![WorkerCommand::Refresh(ticket)];
                if first {
                    info!(block, round = ticket.round, "first block observed");
                    self.set_status(format!("Connected at block {block}"));
                    commands.push(WorkerCommand::RefreshBalance(self.session.refresh_balance()));
                }
                commands
            }
            WorkerEvent::Totals { ticket, totals } => {
                self.session.apply_totals(ticket, totals);
                Vec::new()
            }
            WorkerEvent::Earnings { ticket, earnings } => {
                self.session.apply_earnings(ticket, earnings);
                Vec::new()
            }
            WorkerEvent::Balance { ticket, balance } => {
                self.session.apply_balance(ticket, balance);
                Vec::new()
            }
            WorkerEvent::Submitted { request, result } => {
                self.submitting = self.submitting.saturating_sub(1);
                match result {
                    Ok(followup) => {
                        let block = followup
                            .receipt
                            .block_number
                            .map(|n| format!(" in block {n}"))
                            .unwrap_or_default();
                        self.set_status(format!("{} confirmed{block}", request.action.describe()));
                        let mut commands = Vec::new();
                        if followup.refresh_balance {
                            commands.push(WorkerCommand::RefreshBalance(
                                self.session.refresh_balance(),
                            ));
                        }
                        let viewed = self.session.view().map(|view| view.viewed_round());
                        if let Some(round) = followup.refresh_round.filter(|r| Some(*r) == viewed) {
                            commands.push(WorkerCommand::Refresh(self.session.refresh(round)));
                        }
                        commands
                    }
                    Err(e) => {
                        self.set_status(format!("{} failed", request.action.describe()));
                        self.push_errors(vec![format!("{}: {e}", request.action.describe())]);
                        Vec::new()
                    }
                }
            }
        }
    }

    pub fn on_user_event(&mut self, event: ui::UserEvent) -> Control {
        let commands = match event {
            ui::UserEvent::Quit => return Control::Quit,
            ui::UserEvent::Previous => self
                .session
                .go_to_previous()
                .map(|ticket| {
                    vec![
                        WorkerCommand::Refresh(ticket),
                        WorkerCommand::ReadBlock(BlockPurpose::Poll),
                    ]
                })
                .unwrap_or_default(),
            ui::UserEvent::Next => self
                .session
                .go_to_next()
                .map(|ticket| vec![WorkerCommand::Refresh(ticket)])
                .unwrap_or_default(),
            ui::UserEvent::Latest => vec![WorkerCommand::ReadBlock(BlockPurpose::Latest)],
            ui::UserEvent::AmountInput(c) => {
                self.edit_amount(Some(c));
                Vec::new()
            }
            ui::UserEvent::AmountErase => {
                self.edit_amount(None);
                Vec::new()
            }
            ui::UserEvent::Act(action) => self.submit(action),
            ui::UserEvent::Redraw => Vec::new(),
        };
        Control::Continue(commands)
    }

    fn edit_amount(&mut self, input: Option<char>) {
        let mut amount = self.session.account().pending_tx_amount().to_string();
        match input {
            None => {
                amount.pop();
            }
            Some('.') if amount.contains('.') => return,
            Some(c) if (c.is_ascii_digit() || c == '.') && amount.len() < MAX_AMOUNT_LEN => {
                amount.push(c);
            }
            Some(_) => return,
        }
        self.session.set_pending_tx_amount(amount);
    }

    fn submit(&mut self, action: Action) -> Vec<WorkerCommand> {
        match self.session.prepare(action) {
            Ok(request) => {
                let message = match action {
                    Action::Claim => format!("Claiming round {}...", request.round),
                    _ => format!("Submitting {} of {} credits...", action.describe(), request.amount),
                };
                self.set_status(message);
                self.submitting += 1;
                vec![WorkerCommand::Submit(request)]
            }
            Err(e) => {
                self.push_errors(vec![format!("{}: {e}", action.describe())]);
                Vec::new()
            }
        }
    }
}

fn resolve_contract(config: &AppConfig, chain_id: u64) -> Result<Address> {
    let store = DeploymentStore::open(&config.deployments_dir, chain_id)
        .wrap_err("opening deployments store")?;
    if let Some(address) = config.contract {
        if store.record(DeploymentRecord::new(address, &config.rpc_url))? {
            info!(chain_id, contract = ?address, "recorded contract address");
        }
        return Ok(address);
    }
    let record = store.latest()?.ok_or_else(|| {
        eyre!("No RedVsBlue contract recorded for chain {chain_id}; pass --contract <address>")
    })?;
    record.address()
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let provider = evm::connect(&config.rpc_url, config.poll_interval)?;
    let chain_id = evm::chain_id(&provider)
        .await
        .wrap_err_with(|| format!("Failed to reach the ledger node at {}", config.rpc_url))?;
    let contract = resolve_contract(&config, chain_id)?;
    info!(chain_id, contract = ?contract, "using RedVsBlue contract");

    match config.keystore.as_deref() {
        Some(path) => {
            let wallet = wallets::unlock_keystore(path, chain_id)?;
            let signer = wallet.address();
            let client = Arc::new(SignerMiddleware::new(provider, wallet));
            run_with_gateway(&config, EvmGateway::new(client, contract, Some(signer))).await
        }
        None => {
            let gateway = EvmGateway::new(Arc::new(provider), contract, None);
            run_with_gateway(&config, gateway).await
        }
    }
}

async fn run_with_gateway<M: Middleware + 'static>(
    config: &AppConfig,
    gateway: EvmGateway<M>,
) -> Result<()> {
    let session = Session::new(config.index, config.tx_amount.clone());
    let controller = AppController::new(session, gateway.address());
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        controller,
        gateway.clone(),
        gateway,
        config.poll_interval,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

fn dispatch(cmd_tx: &mpsc::UnboundedSender<WorkerCommand>, commands: Vec<WorkerCommand>) {
    for command in commands {
        if cmd_tx.send(command).is_err() {
            warn!("refresh worker is gone, command dropped");
            return;
        }
    }
}

async fn run_loop<L, C>(
    mut controller: AppController,
    ledger: L,
    contract: C,
    poll_interval: Duration,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()>
where
    L: LedgerGateway + Clone + 'static,
    C: ContractProxy + Clone + 'static,
{
    info!("Running app loop");
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker_handle = tokio::spawn(worker::refresh_worker(
        poll_interval,
        ledger,
        contract,
        cmd_rx,
        event_tx,
    ));

    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    let mut worker_closed = false;

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("refresh worker channel closed");
                    worker_closed = true;
                    break;
                };
                let commands = controller.on_worker_event(event);
                dispatch(&cmd_tx, commands);
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after worker event failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match controller.on_user_event(ev) {
                    Control::Quit => break,
                    Control::Continue(commands) => dispatch(&cmd_tx, commands),
                }
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after user input failed")?;
            }
        }
    }

    let _ = cmd_tx.send(WorkerCommand::Shutdown);
    match worker_handle.await {
        Ok(Ok(())) => {
            if worker_closed {
                return Err(eyre!(
                    "Refresh worker exited unexpectedly; check the ledger connection"
                ));
            }
        }
        Ok(Err(err)) => {
            return Err(err).wrap_err("refresh worker failed");
        }
        Err(err) => {
            return Err(eyre!(err)).wrap_err("refresh worker panicked");
        }
    }
    Ok(())
}
