//! Moving Average Convergence/Divergence indicator.

/// Two index-aligned indicator lines, oldest value first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorLines {
    /// MACD line (fast EMA minus slow EMA)
    pub fast: Vec<f64>,
    /// Signal line (EMA of the MACD line)
    pub signal: Vec<f64>,
}

/// Price series in, two aligned lines out.
pub trait Indicator: Send + Sync {
    fn compute(&self, closes: &[f64]) -> IndicatorLines;

    /// Number of samples before the output settles.
    fn warmup_periods(&self) -> usize;
}

/// MACD with EMAs seeded on the first close, so every output point is defined
/// even on short series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    fn compute(&self, closes: &[f64]) -> IndicatorLines {
        let fast_ema = ema(closes, self.fast);
        let slow_ema = ema(closes, self.slow);

        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal = ema(&macd, self.signal);

        IndicatorLines { fast: macd, signal }
    }

    fn warmup_periods(&self) -> usize {
        self.slow + self.signal
    }
}

/// Exponential moving average with `alpha = 2 / (period + 1)`, seeded with
/// the first value.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &value in values {
        let next = match prev {
            None => value,
            Some(p) => alpha * value + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }

    out
}
