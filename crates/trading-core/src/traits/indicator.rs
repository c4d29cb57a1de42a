//! Indicator trait definitions.

/// Indicator updated one value at a time.
pub trait StreamingIndicator: Send + Sync {
    type Output;

    /// Update the indicator with a new value.
    ///
    /// # Returns
    /// The current indicator value, or None if not yet ready
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    /// Get the current value without adding new data.
    fn current(&self) -> Option<Self::Output>;

    /// Reset the indicator state.
    fn reset(&mut self);

    /// Check if the indicator has enough data to produce values.
    fn is_ready(&self) -> bool;

    /// Get the minimum data points required.
    fn period(&self) -> usize;
}
