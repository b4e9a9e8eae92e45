//! Crossover detection on the two most recent indicator points.

use tracing::info;

use crate::error::TradingError;
use crate::models::Signal;

/// Compare the latest and previous points of the MACD and signal lines.
///
/// Both comparisons must be strict: a tie at either point yields
/// `Signal::None`. The lines must be index-aligned and hold at least two
/// points.
pub fn detect(fast: &[f64], signal: &[f64]) -> Result<Signal, TradingError> {
    if fast.len() != signal.len() {
        return Err(TradingError::MisalignedLines {
            fast: fast.len(),
            signal: signal.len(),
        });
    }
    if fast.len() < 2 {
        return Err(TradingError::InsufficientData(fast.len()));
    }

    let n = fast.len();
    let (fast_now, fast_prev) = (fast[n - 1], fast[n - 2]);
    let (signal_now, signal_prev) = (signal[n - 1], signal[n - 2]);

    let result = if fast_now > signal_now && fast_prev < signal_prev {
        Signal::Buy
    } else if fast_now < signal_now && fast_prev > signal_prev {
        Signal::Sell
    } else {
        Signal::None
    };

    if !result.is_none() {
        info!(
            signal = %result,
            macd_now = fast_now,
            signal_now = signal_now,
            macd_prev = fast_prev,
            signal_prev = signal_prev,
            "Crossover detected"
        );
    }

    Ok(result)
}
