use crate::{
    Error,
    Result,
};

pub type RoundId = u64;
pub type RoundOffset = u64;

/// Blocks per round used by the deployed game.
pub const DEFAULT_BLOCK_DIV: u64 = 128;

/// Where a block number lands in the round sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundPosition {
    pub round: RoundId,
    pub offset: RoundOffset,
}

/// Maps block numbers onto fixed-length rounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundIndex {
    block_div: u64,
}

impl RoundIndex {
    pub fn new(block_div: u64) -> Result<Self> {
        if block_div == 0 {
            return Err(Error::InvalidInput(String::from(
                "epoch length must be greater than zero",
            )));
        }
        Ok(Self { block_div })
    }

    pub fn block_div(&self) -> u64 {
        self.block_div
    }

    pub fn round_of(&self, block: u64) -> RoundId {
        block / self.block_div
    }

    pub fn offset_of(&self, block: u64) -> RoundOffset {
        block % self.block_div
    }

    pub fn position(&self, block: u64) -> RoundPosition {
        RoundPosition {
            round: self.round_of(block),
            offset: self.offset_of(block),
        }
    }

    /// Same as [`RoundIndex::position`] for block numbers that arrive signed.
    pub fn locate(&self, block: i64) -> Result<RoundPosition> {
        let block = u64::try_from(block).map_err(|_| {
            Error::InvalidInput(format!("negative block number {block}"))
        })?;
        Ok(self.position(block))
    }

    pub fn blocks_left(&self, offset: RoundOffset) -> u64 {
        self.block_div.saturating_sub(offset)
    }
}

impl Default for RoundIndex {
    fn default() -> Self {
        Self {
            block_div: DEFAULT_BLOCK_DIV,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn position__block_300_with_default_div__lands_in_round_2_offset_44() {
        // given
        let index = RoundIndex::new(128).unwrap();

        // when
        let actual = index.position(300);

        // then
        let expected = RoundPosition {
            round: 2,
            offset: 44,
        };
        assert_eq!(expected, actual);
        assert_eq!(84, index.blocks_left(actual.offset));
    }

    #[test]
    fn new__zero_block_div__is_rejected() {
        let actual = RoundIndex::new(0);

        assert!(matches!(actual, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn locate__negative_block__is_rejected() {
        // given
        let index = RoundIndex::default();

        // when
        let actual = index.locate(-1);

        // then
        assert!(matches!(actual, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn locate__non_negative_block__matches_position() {
        let index = RoundIndex::default();

        let actual = index.locate(1_000).unwrap();

        assert_eq!(index.position(1_000), actual);
    }

    #[test]
    fn round_of__block_on_boundary__starts_new_round() {
        let index = RoundIndex::new(10).unwrap();

        assert_eq!(0, index.round_of(9));
        assert_eq!(1, index.round_of(10));
        assert_eq!(0, index.offset_of(10));
    }

    proptest! {
        #[test]
        fn position__any_block__recomposes_to_block(
            block in any::<u64>(),
            block_div in 1u64..=1_000_000,
        ) {
            let index = RoundIndex::new(block_div).unwrap();

            let position = index.position(block);

            prop_assert!(position.offset < block_div);
            prop_assert_eq!(position.round * block_div + position.offset, block);
        }
    }
}
