//! Emission policies and the fractional spawn scheduler

use ember_core::{EmberError, Result};

/// Slack added before flooring the budget, so chunkings like 60 × 1/60 s
/// still spawn exactly `rate × seconds` despite float rounding.
const BUDGET_EPSILON: f64 = 1e-9;

/// How many particles a system asks for over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmissionPolicy {
    /// `rate` particles per second, spread evenly across ticks
    Constant { rate: f64 },
    /// `count` particles at once, every `interval` seconds
    Burst { count: u32, interval: f64 },
}

impl EmissionPolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            EmissionPolicy::Constant { rate } if !rate.is_finite() || rate < 0.0 => Err(
                EmberError::Config(format!("emission rate must be non-negative, got {rate}")),
            ),
            EmissionPolicy::Burst { interval, .. } if !interval.is_finite() || interval <= 0.0 => {
                Err(EmberError::Config(format!(
                    "burst interval must be positive, got {interval}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Converts elapsed time into whole spawn counts.
///
/// The constant policy accumulates a fractional budget (`budget += rate * dt`)
/// and spawns its integer part, carrying the remainder, so the long-run
/// average converges to `rate` regardless of frame jitter.
#[derive(Debug, Clone)]
pub struct EmissionScheduler {
    policy: EmissionPolicy,
    /// Fractional particle accumulator for sub-frame emission
    budget: f64,
    /// Time since the last burst
    since_burst: f64,
}

impl EmissionScheduler {
    pub fn new(policy: EmissionPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            budget: 0.0,
            since_burst: 0.0,
        })
    }

    pub fn policy(&self) -> EmissionPolicy {
        self.policy
    }

    /// Swap the policy in place, keeping the accumulated budget
    pub fn set_policy(&mut self, policy: EmissionPolicy) -> Result<()> {
        policy.validate()?;
        self.policy = policy;
        Ok(())
    }

    /// Change the constant rate in place; a burst policy becomes constant
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.set_policy(EmissionPolicy::Constant { rate })
    }

    /// Forget any accumulated budget
    pub fn reset(&mut self) {
        self.budget = 0.0;
        self.since_burst = 0.0;
    }

    /// Spawn count for a tick of `dt` seconds. Non-positive `dt` spawns nothing.
    pub fn tick(&mut self, dt: f64) -> usize {
        if dt.is_nan() || dt <= 0.0 {
            return 0;
        }
        match self.policy {
            EmissionPolicy::Constant { rate } => {
                self.budget += rate * dt;
                let whole = (self.budget + BUDGET_EPSILON).floor();
                self.budget -= whole;
                whole as usize
            }
            EmissionPolicy::Burst { count, interval } => {
                self.since_burst += dt;
                let bursts = ((self.since_burst + BUDGET_EPSILON) / interval).floor();
                self.since_burst -= bursts * interval;
                bursts as usize * count as usize
            }
        }
    }
}
