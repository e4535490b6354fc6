use crate::round::RoundId;
use std::fmt;

/// The two colours a vote can back. Red is side A, blue is side B.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    pub fn is_blue(self) -> bool {
        matches!(self, Side::Blue)
    }

    pub fn other(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Red => "RED",
            Side::Blue => "BLUE",
        };
        write!(f, "{name}")
    }
}

/// Wagered totals of a round, in credits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GameTotals {
    pub red: f64,
    pub blue: f64,
}

impl GameTotals {
    pub fn new(red: f64, blue: f64) -> Self {
        Self { red, blue }
    }

    pub fn of(&self, side: Side) -> f64 {
        match side {
            Side::Red => self.red,
            Side::Blue => self.blue,
        }
    }

    pub fn sum(&self) -> f64 {
        self.red + self.blue
    }
}

/// The caller's stake and payout in a round, in credits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Earnings {
    pub reward: f64,
    pub bet: f64,
    pub claimed: bool,
}

impl Earnings {
    pub fn claimable(&self) -> bool {
        !self.claimed && self.reward > 0.0
    }

    pub fn profit(&self) -> f64 {
        self.reward - self.bet
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Winning,
    Losing,
    Tie,
    Winner,
    Loser,
    Tied,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Winning => "WINNING",
            Outcome::Losing => "LOSING",
            Outcome::Tie => "TIE",
            Outcome::Winner => "WINNER",
            Outcome::Loser => "LOSER",
            Outcome::Tied => "TIED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Share of `total` held by `v`, in percent.
///
/// The boundaries are returned as exact constants so a display never shows
/// 99.99 or 50.01 for an even or one-sided split.
pub fn side_percent(v: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 50.0;
    }
    if v == total {
        return 100.0;
    }
    if v == 0.0 {
        return 0.0;
    }
    100.0 * v / total
}

/// [`side_percent`] rendered and cut to at most five characters.
pub fn percent_label(v: f64, total: f64) -> String {
    let mut label = side_percent(v, total).to_string();
    label.truncate(5);
    label
}

pub fn outcome(totals: &GameTotals, side: Side, is_active: bool) -> Outcome {
    let mine = totals.of(side);
    let theirs = totals.of(side.other());
    match (mine.partial_cmp(&theirs), is_active) {
        (Some(std::cmp::Ordering::Greater), true) => Outcome::Winning,
        (Some(std::cmp::Ordering::Greater), false) => Outcome::Winner,
        (Some(std::cmp::Ordering::Less), true) => Outcome::Losing,
        (Some(std::cmp::Ordering::Less), false) => Outcome::Loser,
        (_, true) => Outcome::Tie,
        (_, false) => Outcome::Tied,
    }
}

/// What is known about the viewed round. Each half is replaced when its
/// latest fetch lands; the whole value is reset when the viewed round changes.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundMetrics {
    round: RoundId,
    totals: Option<GameTotals>,
    earnings: Option<Earnings>,
}

impl RoundMetrics {
    pub fn empty(round: RoundId) -> Self {
        Self {
            round,
            totals: None,
            earnings: None,
        }
    }

    pub fn round(&self) -> RoundId {
        self.round
    }

    pub fn totals(&self) -> Option<&GameTotals> {
        self.totals.as_ref()
    }

    pub fn earnings(&self) -> Option<&Earnings> {
        self.earnings.as_ref()
    }

    pub(crate) fn set_totals(&mut self, totals: GameTotals) {
        self.totals = Some(totals);
    }

    pub(crate) fn set_earnings(&mut self, earnings: Earnings) {
        self.earnings = Some(earnings);
    }

    pub fn side_percent(&self, side: Side) -> f64 {
        let totals = self.totals.unwrap_or_default();
        side_percent(totals.of(side), totals.sum())
    }

    pub fn percent_label(&self, side: Side) -> String {
        let totals = self.totals.unwrap_or_default();
        percent_label(totals.of(side), totals.sum())
    }

    pub fn outcome(&self, side: Side, is_active: bool) -> Outcome {
        outcome(&self.totals.unwrap_or_default(), side, is_active)
    }

    pub fn claimable(&self) -> bool {
        self.earnings.is_some_and(|earnings| earnings.claimable())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn side_percent__zero_total__is_an_even_split() {
        assert_eq!(50.0, side_percent(0.0, 0.0));
    }

    #[test]
    fn side_percent__whole_total__is_exactly_one_hundred() {
        assert_eq!(100.0, side_percent(0.3, 0.3));
        assert_eq!(0.0, side_percent(0.0, 0.3));
    }

    #[test]
    fn percent_label__repeating_fraction__is_cut_to_five_chars() {
        assert_eq!("33.33", percent_label(1.0, 3.0));
        assert_eq!("66.66", percent_label(2.0, 3.0));
        assert_eq!("50", percent_label(0.0, 0.0));
        assert_eq!("100", percent_label(7.0, 7.0));
    }

    #[test]
    fn outcome__both_sides_empty__is_a_tie_with_even_split() {
        // given
        let metrics = RoundMetrics {
            round: 3,
            totals: Some(GameTotals::new(0.0, 0.0)),
            earnings: None,
        };

        // then
        assert_eq!(Outcome::Tie, metrics.outcome(Side::Red, true));
        assert_eq!(Outcome::Tied, metrics.outcome(Side::Blue, false));
        assert_eq!(50.0, metrics.side_percent(Side::Red));
        assert_eq!(50.0, metrics.side_percent(Side::Blue));
    }

    #[test]
    fn outcome__red_ahead__labels_depend_on_activity() {
        let totals = GameTotals::new(200.0, 100.0);

        assert_eq!(Outcome::Winning, outcome(&totals, Side::Red, true));
        assert_eq!(Outcome::Losing, outcome(&totals, Side::Blue, true));
        assert_eq!(Outcome::Winner, outcome(&totals, Side::Red, false));
        assert_eq!(Outcome::Loser, outcome(&totals, Side::Blue, false));
    }

    #[test]
    fn claimable__requires_unclaimed_positive_reward() {
        let unclaimed = Earnings {
            reward: 10.0,
            bet: 5.0,
            claimed: false,
        };
        let claimed = Earnings {
            claimed: true,
            ..unclaimed
        };
        let nothing = Earnings {
            reward: 0.0,
            ..unclaimed
        };

        assert!(unclaimed.claimable());
        assert!(!claimed.claimable());
        assert!(!nothing.claimable());
        assert_eq!(5.0, unclaimed.profit());
    }

    #[test]
    fn empty_metrics__render_as_even_split() {
        let metrics = RoundMetrics::empty(9);

        assert_eq!("50", metrics.percent_label(Side::Red));
        assert!(!metrics.claimable());
    }

    proptest! {
        #[test]
        fn side_percent__partial_share__is_strictly_inside_and_complementary(
            (total, share) in (2u64..=1_000_000_000)
                .prop_flat_map(|total| (Just(total), 1..total)),
        ) {
            let (v, t) = (share as f64, total as f64);

            let mine = side_percent(v, t);
            let theirs = side_percent(t - v, t);

            prop_assert!(mine > 0.0 && mine < 100.0);
            prop_assert!((mine + theirs - 100.0).abs() < 1e-9);
        }
    }
}
