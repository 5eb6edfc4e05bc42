//! Thread Builder: ordered, role-tagged turns with round assignment.

use omni_types::{ConfidenceTier, RoundLayout};

use crate::locator::{LocateResult, RenderedTurn};

/// Located turns plus their round layout.
#[derive(Debug, Clone, Default)]
pub struct Thread {
    turns: Vec<RenderedTurn>,
    layout: RoundLayout,
    tier: ConfidenceTier,
}

impl Thread {
    /// Build from a locate pass. Turns are re-indexed in document order.
    #[must_use]
    pub fn build(result: LocateResult) -> Self {
        let mut turns = result.turns;
        for (index, turn) in turns.iter_mut().enumerate() {
            turn.sequence_index = index;
        }
        let layout = RoundLayout::from_roles(turns.iter().map(|t| t.role));
        Self {
            turns,
            layout,
            tier: result.tier,
        }
    }

    /// Turns in document order.
    #[must_use]
    pub fn turns(&self) -> &[RenderedTurn] {
        &self.turns
    }

    /// Shared round layout.
    #[must_use]
    pub fn layout(&self) -> &RoundLayout {
        &self.layout
    }

    /// Tier the turns came from.
    #[must_use]
    pub fn tier(&self) -> ConfidenceTier {
        self.tier
    }

    /// Total rounds, visible or not.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.layout.round_count()
    }

    /// Round of the turn at `index`; `None` before the first round.
    #[must_use]
    pub fn round_of(&self, index: usize) -> Option<usize> {
        self.layout.round_of(index)
    }

    /// True when there is nothing to work with.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
