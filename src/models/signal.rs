//! Directional signal derived from an indicator crossover.

use serde::{Deserialize, Serialize};

/// Discrete crossover signal, recomputed every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Fast line crossed above the signal line
    Buy,
    /// Fast line crossed below the signal line
    Sell,
    /// No crossover on the latest sample
    None,
}

impl Signal {
    pub fn is_none(&self) -> bool {
        matches!(self, Signal::None)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::None => "none",
        };
        f.write_str(s)
    }
}
