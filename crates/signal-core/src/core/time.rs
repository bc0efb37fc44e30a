/// Fixed-interval accumulator.
/// Turns variable frame deltas into a whole number of fixed steps, used for
/// the slow cadence (HUD refresh, autosave and comms checks).
pub struct FixedTimestep {
    /// The fixed delta time per step.
    dt: f32,
    /// Accumulated time from variable frame deltas.
    accumulator: f32,
    /// Steps reported per frame, at most.
    max_steps: u32,
}

impl FixedTimestep {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
            max_steps: 10,
        }
    }

    /// Limit how many steps one frame may report. Extra time is dropped.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Add frame time to the accumulator. Returns the number of fixed steps to run.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        if !frame_dt.is_finite() || frame_dt <= 0.0 {
            return 0;
        }
        self.accumulator += frame_dt;
        // Cap to prevent a spiral of catch-up steps after a stall
        self.accumulator = self.accumulator.min(self.dt * self.max_steps as f32);
        let steps = (self.accumulator / self.dt) as u32;
        self.accumulator -= steps as f32 * self.dt;
        steps
    }
}

/// Clamp a raw frame delta to something safe to credit.
pub fn clamp_frame_dt(frame_dt: f32, max_dt: f32) -> f32 {
    if frame_dt.is_finite() && frame_dt > 0.0 {
        frame_dt.min(max_dt)
    } else {
        0.0
    }
}
