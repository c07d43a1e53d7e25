//! Clock-hour access window

use super::{ChainState, Gate};
use crate::config::TimeWindowConfig;
use crate::models::{Decision, GateRequest, RejectionKind};
use chrono::Timelike;

/// Admits requests whose arrival hour lies in `[start_hour, end_hour)`
#[derive(Debug, Clone)]
pub struct TimeWindowGate {
    start_hour: u32,
    end_hour: u32,
    message: String,
}

impl TimeWindowGate {
    /// A window with `start_hour >= end_hour` never admits anything.
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        let message = format!(
            "Access to the messaging app is only allowed between {} and {} server time.",
            twelve_hour(start_hour),
            twelve_hour(end_hour)
        );
        Self {
            start_hour,
            end_hour,
            message,
        }
    }

    pub fn from_config(config: &TimeWindowConfig) -> Self {
        Self::new(config.start_hour, config.end_hour)
    }

    pub fn allows_hour(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// 18 -> "6 PM", 0 -> "12 AM"
fn twelve_hour(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{} {}", display, suffix)
}

impl Gate for TimeWindowGate {
    fn name(&self) -> &'static str {
        "time_window"
    }

    fn stage(&self) -> ChainState {
        ChainState::TimeChecked
    }

    fn evaluate(&self, request: &GateRequest) -> Decision {
        if self.allows_hour(request.arrival.hour()) {
            Decision::Pass
        } else {
            Decision::reject(RejectionKind::ForbiddenTimeWindow, self.message.clone())
        }
    }
}
