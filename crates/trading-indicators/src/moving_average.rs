//! Simple moving average.

use std::collections::VecDeque;
use trading_core::error::IndicatorError;
use trading_core::traits::StreamingIndicator;

/// Streaming Simple Moving Average over the most recent `period` values.
///
/// The mean is recomputed from the window on every update; there is no
/// running sum.
#[derive(Debug, Clone)]
pub struct RollingSma {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingSma {
    /// Create a streaming SMA with the specified period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "SMA period must be greater than 0".into(),
            ));
        }
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
        })
    }

    fn mean(&self) -> f64 {
        self.window.iter().sum::<f64>() / self.period as f64
    }
}

impl StreamingIndicator for RollingSma {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.current()
    }

    fn current(&self) -> Option<f64> {
        self.is_ready().then(|| self.mean())
    }

    fn reset(&mut self) {
        self.window.clear();
    }

    fn is_ready(&self) -> bool {
        self.window.len() == self.period
    }

    fn period(&self) -> usize {
        self.period
    }
}
