use crate::round::RoundId;
use tracing::debug;

/// Tag carried by a totals/earnings fetch for one round.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct FetchTicket {
    pub round: RoundId,
    pub seq: u64,
}

/// Tag carried by a credit balance fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BalanceTicket {
    pub seq: u64,
}

/// What happened to a fetch result on arrival.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reconciled {
    Applied,
    StaleResponseDiscarded,
}

/// Hands out sequence-tagged tickets and decides whether a completed fetch
/// may still be applied.
///
/// A result is current only if it carries the newest ticket and that ticket
/// names the viewed round. Issuing a ticket supersedes every earlier one,
/// whatever its round. Results are never cancelled in flight; superseded
/// ones are dropped when they land.
#[derive(Clone, Debug, Default)]
pub struct MetricsReconciler {
    next_seq: u64,
    latest: Option<FetchTicket>,
    latest_balance: Option<u64>,
}

impl MetricsReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    pub fn issue(&mut self, round: RoundId) -> FetchTicket {
        let ticket = FetchTicket {
            round,
            seq: self.bump(),
        };
        self.latest = Some(ticket);
        ticket
    }

    pub fn issue_balance(&mut self) -> BalanceTicket {
        let seq = self.bump();
        self.latest_balance = Some(seq);
        BalanceTicket { seq }
    }

    pub fn check(&self, ticket: FetchTicket, viewed_round: Option<RoundId>) -> Reconciled {
        let latest = self.latest;
        if viewed_round == Some(ticket.round) && latest == Some(ticket) {
            Reconciled::Applied
        } else {
            debug!(
                round = ticket.round,
                seq = ticket.seq,
                ?viewed_round,
                ?latest,
                "stale round response discarded"
            );
            Reconciled::StaleResponseDiscarded
        }
    }

    pub fn check_balance(&self, ticket: BalanceTicket) -> Reconciled {
        if self.latest_balance == Some(ticket.seq) {
            Reconciled::Applied
        } else {
            debug!(seq = ticket.seq, latest = ?self.latest_balance, "stale balance response discarded");
            Reconciled::StaleResponseDiscarded
        }
    }
}
