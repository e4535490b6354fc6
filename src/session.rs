use crate::{
    Error,
    Result,
    metrics::{
        Earnings,
        GameTotals,
        RoundMetrics,
        Side,
    },
    reconciler::{
        BalanceTicket,
        FetchTicket,
        MetricsReconciler,
        Reconciled,
    },
    round::{
        RoundId,
        RoundIndex,
    },
    state::{
        RoundStateMachine,
        ViewState,
    },
};

pub const DEFAULT_TX_AMOUNT: &str = "100";

#[derive(Clone, Debug, PartialEq)]
pub struct AccountState {
    credit_balance: f64,
    pending_tx_amount: String,
}

impl AccountState {
    pub fn credit_balance(&self) -> f64 {
        self.credit_balance
    }

    pub fn pending_tx_amount(&self) -> &str {
        &self.pending_tx_amount
    }
}

/// User-initiated mutating actions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Vote(Side),
    Deposit,
    Withdraw,
    Claim,
}

impl Action {
    pub fn describe(self) -> &'static str {
        match self {
            Action::Vote(Side::Red) => "vote red",
            Action::Vote(Side::Blue) => "vote blue",
            Action::Deposit => "deposit",
            Action::Withdraw => "withdraw",
            Action::Claim => "claim",
        }
    }
}

/// Everything the orchestrator needs to submit one action, captured from the
/// session at the moment the user asked for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionRequest {
    pub action: Action,
    pub amount: String,
    pub round: RoundId,
}

/// Per-session state of the client: the round view, metrics of the viewed
/// round and the account mirror. Every mutation goes through here.
#[derive(Clone, Debug)]
pub struct Session {
    rounds: RoundStateMachine,
    reconciler: MetricsReconciler,
    metrics: RoundMetrics,
    account: AccountState,
}

impl Session {
    pub fn new(index: RoundIndex, tx_amount: impl Into<String>) -> Self {
        Self {
            rounds: RoundStateMachine::new(index),
            reconciler: MetricsReconciler::new(),
            metrics: RoundMetrics::empty(0),
            account: AccountState {
                credit_balance: 0.0,
                pending_tx_amount: tx_amount.into(),
            },
        }
    }

    pub fn index(&self) -> &RoundIndex {
        self.rounds.index()
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.rounds.view()
    }

    pub fn metrics(&self) -> &RoundMetrics {
        &self.metrics
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn can_go_previous(&self) -> bool {
        self.rounds.can_go_previous()
    }

    pub fn can_go_next(&self) -> bool {
        self.rounds.can_go_next()
    }

    pub fn observe(&mut self, block: u64) -> FetchTicket {
        let round = self.rounds.observe(block);
        self.refresh(round)
    }

    pub fn go_to_previous(&mut self) -> Option<FetchTicket> {
        let round = self.rounds.go_to_previous()?;
        Some(self.refresh(round))
    }

    pub fn go_to_next(&mut self) -> Option<FetchTicket> {
        let round = self.rounds.go_to_next()?;
        Some(self.refresh(round))
    }

    pub fn go_to_latest(&mut self, block: u64) -> FetchTicket {
        let round = self.rounds.go_to_latest(block);
        self.refresh(round)
    }

    /// Issues a metrics fetch for `round`, dropping metrics of a round that is
    /// no longer on screen.
    pub fn refresh(&mut self, round: RoundId) -> FetchTicket {
        self.sync_metrics_round();
        self.reconciler.issue(round)
    }

    pub fn refresh_balance(&mut self) -> BalanceTicket {
        self.reconciler.issue_balance()
    }

    fn sync_metrics_round(&mut self) {
        if let Some(viewed) = self.rounds.viewed_round()
            && viewed != self.metrics.round()
        {
            self.metrics = RoundMetrics::empty(viewed);
        }
    }

    pub fn apply_totals(&mut self, ticket: FetchTicket, totals: GameTotals) -> Reconciled {
        let verdict = self.reconciler.check(ticket, self.rounds.viewed_round());
        if verdict == Reconciled::Applied {
            self.metrics.set_totals(totals);
        }
        verdict
    }

    pub fn apply_earnings(
        &mut self,
        ticket: FetchTicket,
        earnings: Earnings,
    ) -> Reconciled {
        let verdict = self.reconciler.check(ticket, self.rounds.viewed_round());
        if verdict == Reconciled::Applied {
            self.metrics.set_earnings(earnings);
        }
        verdict
    }

    pub fn apply_balance(&mut self, ticket: BalanceTicket, balance: f64) -> Reconciled {
        let verdict = self.reconciler.check_balance(ticket);
        if verdict == Reconciled::Applied {
            self.account.credit_balance = balance;
        }
        verdict
    }

    pub fn set_pending_tx_amount(&mut self, amount: impl Into<String>) {
        self.account.pending_tx_amount = amount.into();
    }

    /// Captures the inputs of `action`. Votes target the ongoing round, claims
    /// the viewed one.
    pub fn prepare(&self, action: Action) -> Result<ActionRequest> {
        let view = self.view().ok_or_else(|| {
            Error::InvalidInput(String::from("no block number observed yet"))
        })?;
        let round = match action {
            Action::Claim => view.viewed_round(),
            _ => view.latest_round(),
        };
        Ok(ActionRequest {
            action,
            amount: self.account.pending_tx_amount.clone(),
            round,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn session() -> Session {
        Session::new(RoundIndex::new(128).unwrap(), DEFAULT_TX_AMOUNT)
    }

    #[test]
    fn apply_totals__navigation_races_in_flight_fetch__newer_round_wins() {
        // given
        let mut session = session();
        let round_five = session.observe(5 * 128 + 3);
        session.observe(6 * 128 + 1);
        session.go_to_previous();
        let round_five_again = session.refresh(5);
        let round_six = session.go_to_next().unwrap();

        // when
        let six = session.apply_totals(round_six, GameTotals::new(6.0, 60.0));
        let late_five = session.apply_totals(round_five_again, GameTotals::new(5.0, 50.0));
        let first_five = session.apply_totals(round_five, GameTotals::new(1.0, 1.0));

        // then
        assert_eq!(Reconciled::Applied, six);
        assert_eq!(Reconciled::StaleResponseDiscarded, late_five);
        assert_eq!(Reconciled::StaleResponseDiscarded, first_five);
        assert_eq!(6, session.metrics().round());
        assert_eq!(Some(&GameTotals::new(6.0, 60.0)), session.metrics().totals());
    }

    #[test]
    fn go_to_previous__clears_metrics_of_the_round_left_behind() {
        // given
        let mut session = session();
        let ticket = session.observe(300);
        session.apply_totals(ticket, GameTotals::new(1.0, 2.0));
        session.apply_earnings(
            ticket,
            Earnings {
                reward: 3.0,
                bet: 1.0,
                claimed: false,
            },
        );

        // when
        let fetch = session.go_to_previous().unwrap();

        // then
        assert_eq!(1, fetch.round);
        assert_eq!(&RoundMetrics::empty(1), session.metrics());
    }

    #[test]
    fn observe__same_round__keeps_metrics_until_fetch_lands() {
        // given
        let mut session = session();
        let first = session.observe(300);
        session.apply_totals(first, GameTotals::new(1.0, 2.0));

        // when
        let second = session.observe(301);

        // then
        assert_eq!(Some(&GameTotals::new(1.0, 2.0)), session.metrics().totals());
        assert_eq!(
            Reconciled::StaleResponseDiscarded,
            session.apply_totals(first, GameTotals::new(9.0, 9.0))
        );
        assert_eq!(
            Reconciled::Applied,
            session.apply_totals(second, GameTotals::new(4.0, 2.0))
        );
    }

    #[test]
    fn apply_balance__older_fetch_landing_late__is_discarded() {
        // given
        let mut session = session();
        let older = session.refresh_balance();
        let newer = session.refresh_balance();

        // when
        session.apply_balance(newer, 42.0);
        let verdict = session.apply_balance(older, 7.0);

        // then
        assert_eq!(Reconciled::StaleResponseDiscarded, verdict);
        assert_eq!(42.0, session.account().credit_balance());
    }

    #[test]
    fn prepare__before_first_observation__is_invalid_input() {
        let session = session();

        let actual = session.prepare(Action::Deposit);

        assert!(matches!(actual, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn prepare__vote_from_history__targets_ongoing_round() {
        // given
        let mut session = session();
        session.observe(300);
        session.go_to_previous();
        session.set_pending_tx_amount("12.5");

        // when
        let vote = session.prepare(Action::Vote(Side::Blue)).unwrap();
        let claim = session.prepare(Action::Claim).unwrap();

        // then
        assert_eq!(2, vote.round);
        assert_eq!("12.5", vote.amount);
        assert_eq!(1, claim.round);
    }
}
