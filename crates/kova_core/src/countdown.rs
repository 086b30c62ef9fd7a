//! crates/kova_core/src/countdown.rs
//!
//! The one countdown used by every timed overlay. It holds no clock of its own:
//! the host calls `tick` on every beat of its interval.

use std::time::Duration;

pub type OnZero = Box<dyn FnMut() + Send + Sync>;

pub struct CountdownConfig {
    pub initial: Duration,
    /// Upper bound for `extend`. Never below `initial`.
    pub max: Duration,
    /// How often the host should call `tick`.
    pub tick: Duration,
    pub on_zero: Option<OnZero>,
}

impl CountdownConfig {
    pub fn new(initial: Duration, max: Duration, tick: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            tick,
            on_zero: None,
        }
    }

    pub fn on_zero(mut self, callback: impl FnMut() + Send + Sync + 'static) -> Self {
        self.on_zero = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for CountdownConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownConfig")
            .field("initial", &self.initial)
            .field("max", &self.max)
            .field("tick", &self.tick)
            .field("on_zero", &self.on_zero.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct CountdownTimer {
    config: CountdownConfig,
    remaining: Duration,
    fired: bool,
}

impl CountdownTimer {
    pub fn new(config: CountdownConfig) -> Self {
        let remaining = config.initial;
        Self {
            config,
            remaining,
            fired: false,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick
    }

    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Advances the countdown. Returns `true` on the tick that reached zero.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.fired {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.fired = true;
            if let Some(callback) = self.config.on_zero.as_mut() {
                callback();
            }
            return true;
        }
        false
    }

    /// Adds time, capped at the configured maximum. Has no effect once expired.
    pub fn extend(&mut self, by: Duration) {
        if self.fired {
            return;
        }
        self.remaining = self.remaining.saturating_add(by).min(self.config.max);
    }

    /// Back to the initial duration and re-armed.
    pub fn reset(&mut self) {
        self.remaining = self.config.initial;
        self.fired = false;
    }

    /// `mm:ss` for the overlay.
    pub fn display(&self) -> String {
        let secs = self.remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
