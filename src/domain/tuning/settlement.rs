/// Tuning for the settlement detector.

#[derive(Debug, Clone, Copy)]
pub struct SettlementTuning {
    /// Distance at which the nearest option begins attracting the puck.
    /// The same threshold governs entry and exit; there is no hysteresis.
    pub attraction_threshold: f32,

    /// Distance at which the decision is considered made and settling starts.
    pub decision_threshold: f32,

    /// Dwell between settling and the final decision, in seconds.
    pub finalize_delay_secs: f32,

    /// Fraction of the remaining distance to the option covered per settling
    /// tick.
    pub settle_rate: f32,

    /// Distance at which conviction falls to zero.
    pub conviction_falloff: f32,
}

impl Default for SettlementTuning {
    fn default() -> Self {
        Self {
            attraction_threshold: 20.0,
            decision_threshold: 8.0,
            finalize_delay_secs: 1.0,
            settle_rate: 0.2,
            conviction_falloff: 30.0,
        }
    }
}
