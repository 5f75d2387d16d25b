//! services/bot/src/adapters/clock.rs
//!
//! The production `Clock`: the host's local wall-clock time.

use chrono::{Local, NaiveDateTime};
use reminder_core::ports::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
