//! Looping piecewise-linear dimmer envelope.
//!
//! A segment's brightness over time is described by an ordered list of steps
//! `(duration_ms, start_percent, end_percent)`. The envelope repeats with
//! period `Σ duration_ms` and evaluates to a factor in [0,1]. An empty
//! envelope, or one whose total duration is zero, is the constant 1.0:
//! segments without a dimmer timeline render at full brightness.

/// One linear ramp. Percent values are integer brightness 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimmerStep {
    pub duration_ms: u64,
    pub start_percent: u8,
    pub end_percent: u8,
}

impl DimmerStep {
    pub fn new(duration_ms: u64, start_percent: u8, end_percent: u8) -> Self {
        Self {
            duration_ms,
            start_percent: start_percent.min(100),
            end_percent: end_percent.min(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DimmerEnvelope {
    steps: Vec<DimmerStep>,
    total_ms: u64,
}

impl DimmerEnvelope {
    pub fn new(steps: Vec<DimmerStep>) -> Self {
        let total_ms = steps.iter().map(|s| s.duration_ms).sum();
        Self { steps, total_ms }
    }

    /// The constant-1.0 envelope.
    pub fn constant() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn steps(&self) -> &[DimmerStep] {
        &self.steps
    }

    /// Brightness factor at `elapsed_ms` since segment birth.
    ///
    /// Negative elapsed time is treated as zero (a segment is never dimmed by
    /// clock skew). The result is clamped to [0,1].
    pub fn value_at(&self, elapsed_ms: i64) -> f32 {
        if self.steps.is_empty() || self.total_ms == 0 {
            return 1.0;
        }
        let elapsed = elapsed_ms.max(0) as u64;
        let mut local = elapsed % self.total_ms;
        for step in &self.steps {
            if local < step.duration_ms {
                let start = f32::from(step.start_percent);
                let end = f32::from(step.end_percent);
                let f = local as f32 / step.duration_ms as f32;
                return ((start + (end - start) * f) / 100.0).clamp(0.0, 1.0);
            }
            local -= step.duration_ms;
        }
        // local < total_ms, so the walk above always lands in a step; this
        // keeps the function total anyway.
        let last = self.steps[self.steps.len() - 1];
        f32::from(last.start_percent) / 100.0
    }
}
