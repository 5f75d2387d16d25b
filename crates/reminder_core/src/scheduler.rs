//! crates/reminder_core/src/scheduler.rs
//!
//! The background task that fires due reminders.
//!
//! Each tick captures `now`, delivers every reminder due at that instant, then deletes
//! the one-off reminders in a single batch and rolls the recurring ones forward.
//! Delivery failures are logged and never block the store update.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::{Disposition, OutboundMessage, Reminder, ReminderId};
use crate::ports::{Clock, DeliveryGateway, PortResult, ReminderStore};
use crate::recurrence::disposition;

/// Default period between ticks.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(60);

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub deleted: u64,
    pub rescheduled: usize,
}

pub struct Scheduler {
    store: Arc<dyn ReminderStore>,
    gateway: Arc<dyn DeliveryGateway>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        gateway: Arc<dyn DeliveryGateway>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            period,
        }
    }

    /// Text delivered when a reminder fires.
    pub fn render(reminder: &Reminder) -> OutboundMessage {
        OutboundMessage::plain(format!("Reminder: {}", reminder.text))
    }

    /// Runs one due-check-and-deliver cycle.
    pub async fn tick(&self) -> PortResult<TickReport> {
        let now = self.clock.now();
        let due = self.store.find_due(now).await?;

        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };
        let mut to_delete: Vec<ReminderId> = Vec::new();
        let mut to_reschedule = Vec::new();

        for reminder in &due {
            match self
                .gateway
                .send(reminder.owner_id, Self::render(reminder))
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.delivery_failures += 1;
                    warn!(
                        reminder_id = reminder.id,
                        owner_id = reminder.owner_id,
                        "Failed to deliver reminder: {}",
                        e
                    );
                }
            }

            match disposition(reminder, now) {
                Disposition::Delete => to_delete.push(reminder.id),
                Disposition::Reschedule(next) => to_reschedule.push((reminder.id, next)),
            }
        }

        if !to_delete.is_empty() {
            match self.store.delete_many(&to_delete).await {
                Ok(affected) => report.deleted = affected,
                Err(e) => error!(ids = ?to_delete, "Failed to delete fired reminders: {}", e),
            }
        }

        for (id, next) in to_reschedule {
            match self.store.update_fire_at(id, next).await {
                Ok(_) => report.rescheduled += 1,
                Err(e) => error!(reminder_id = id, "Failed to reschedule reminder: {}", e),
            }
        }

        if report.due > 0 {
            info!(
                due = report.due,
                delivered = report.delivered,
                deleted = report.deleted,
                rescheduled = report.rescheduled,
                "Scheduler tick finished."
            );
        }
        Ok(report)
    }

    /// Ticks once per period until `cancellation_token` is cancelled.
    pub async fn run(self, cancellation_token: CancellationToken) {
        info!(period_secs = self.period.as_secs(), "Reminder scheduler started.");
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Reminder scheduler cancelled.");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
            }
        }
    }
}
