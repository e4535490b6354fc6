use crate::round::{
    RoundId,
    RoundIndex,
    RoundOffset,
};
use tracing::warn;

/// The session's view of the game.
///
/// `is_active` is derived from the two round ids and only changes through
/// [`ViewState::set_rounds`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ViewState {
    viewed_round: RoundId,
    latest_round: RoundId,
    is_active: bool,
    blocks_elapsed: RoundOffset,
    last_block: u64,
}

impl ViewState {
    fn new(round: RoundId, blocks_elapsed: RoundOffset, last_block: u64) -> Self {
        Self {
            viewed_round: round,
            latest_round: round,
            is_active: true,
            blocks_elapsed,
            last_block,
        }
    }

    fn set_rounds(&mut self, viewed_round: RoundId, latest_round: RoundId) {
        self.viewed_round = viewed_round;
        self.latest_round = latest_round;
        self.is_active = viewed_round == latest_round;
    }

    pub fn viewed_round(&self) -> RoundId {
        self.viewed_round
    }

    pub fn latest_round(&self) -> RoundId {
        self.latest_round
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn blocks_elapsed(&self) -> RoundOffset {
        self.blocks_elapsed
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Phase {
    #[default]
    Uninitialized,
    Viewing(ViewState),
}

/// Tracks which round is on screen relative to the ongoing one.
///
/// Every transition that needs fresh metrics returns the round to fetch;
/// out-of-bounds navigation returns `None` and leaves the state untouched.
#[derive(Clone, Debug)]
pub struct RoundStateMachine {
    index: RoundIndex,
    phase: Phase,
}

impl RoundStateMachine {
    pub fn new(index: RoundIndex) -> Self {
        Self {
            index,
            phase: Phase::Uninitialized,
        }
    }

    pub fn index(&self) -> &RoundIndex {
        &self.index
    }

    pub fn view(&self) -> Option<&ViewState> {
        match &self.phase {
            Phase::Uninitialized => None,
            Phase::Viewing(view) => Some(view),
        }
    }

    pub fn viewed_round(&self) -> Option<RoundId> {
        self.view().map(ViewState::viewed_round)
    }

    /// Applies a freshly read block number. An active view follows the
    /// ongoing round; a historical view stays where it is.
    pub fn observe(&mut self, block: u64) -> RoundId {
        let position = self.index.position(block);
        match &mut self.phase {
            Phase::Uninitialized => {
                let view = ViewState::new(position.round, position.offset, block);
                self.phase = Phase::Viewing(view);
                position.round
            }
            Phase::Viewing(view) => {
                if position.round < view.latest_round {
                    warn!(
                        block,
                        observed_round = position.round,
                        latest_round = view.latest_round,
                        "block number moved backwards; keeping latest round"
                    );
                }
                let latest = view.latest_round.max(position.round);
                let viewed = if view.is_active {
                    latest
                } else {
                    view.viewed_round
                };
                view.set_rounds(viewed, latest);
                if position.round == latest {
                    view.blocks_elapsed = position.offset;
                }
                view.last_block = view.last_block.max(block);
                viewed
            }
        }
    }

    pub fn can_go_previous(&self) -> bool {
        self.view().is_some_and(|view| view.viewed_round > 0)
    }

    pub fn can_go_next(&self) -> bool {
        self.view()
            .is_some_and(|view| view.viewed_round < view.latest_round)
    }

    /// Steps back one round and re-derives against the last known block.
    pub fn go_to_previous(&mut self) -> Option<RoundId> {
        if !self.can_go_previous() {
            return None;
        }
        let Phase::Viewing(view) = &mut self.phase else {
            return None;
        };
        view.set_rounds(view.viewed_round - 1, view.latest_round);
        let last_block = view.last_block;
        Some(self.observe(last_block))
    }

    pub fn go_to_next(&mut self) -> Option<RoundId> {
        if !self.can_go_next() {
            return None;
        }
        let Phase::Viewing(view) = &mut self.phase else {
            return None;
        };
        view.set_rounds(view.viewed_round + 1, view.latest_round);
        Some(view.viewed_round)
    }

    /// Jumps to the round containing a freshly read block.
    pub fn go_to_latest(&mut self, block: u64) -> RoundId {
        let position = self.index.position(block);
        match &mut self.phase {
            Phase::Uninitialized => self.observe(block),
            Phase::Viewing(view) => {
                let latest = view.latest_round.max(position.round);
                view.set_rounds(latest, latest);
                if position.round == latest {
                    view.blocks_elapsed = position.offset;
                }
                view.last_block = view.last_block.max(block);
                latest
            }
        }
    }
}
