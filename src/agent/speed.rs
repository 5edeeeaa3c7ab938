/// The speed model of an agent.
///
/// The target speed is the base speed scaled by a per-agent adjustment and a
/// global factor. Speed is lost instantly when following a slower agent and
/// regained gradually.
#[derive(Clone, Debug)]
pub struct SpeedModel {
    base: f64,
    adjust: f64,
    factor: f64,
    speed: f64,
}

impl SpeedModel {
    /// Creates a new speed model, already travelling at `base`.
    pub fn new(base: f64) -> Self {
        let base = base.max(0.0);
        Self {
            base,
            adjust: 1.0,
            factor: 1.0,
            speed: base,
        }
    }

    /// The distance covered per tick.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The speed the agent recovers to when unobstructed.
    pub fn target(&self) -> f64 {
        self.base * self.adjust * self.factor
    }

    /// Set the per-agent target speed adjustment factor.
    pub fn set_adjust(&mut self, adjust: f64) {
        self.adjust = adjust.max(0.0);
    }

    /// Set the global target speed factor.
    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor.max(0.0);
    }

    /// Moves the speed `rate` closer to the target, never overshooting it.
    pub fn recover(&mut self, rate: f64) {
        let target = self.target();
        self.speed = if self.speed < target {
            f64::min(self.speed + rate, target)
        } else {
            target
        };
    }

    /// Slows down to at most `limit`.
    pub fn clamp_to(&mut self, limit: f64) {
        self.speed = self.speed.min(limit.max(0.0));
    }
}
