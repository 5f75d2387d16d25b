//! services/bot/src/bot/state.rs
//!
//! Defines the application state shared by every inbound event.

use reminder_core::ports::{
    Clock, DeliveryGateway, EditSessionStore, ReminderStore, TimeExpressionParser,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Events)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReminderStore>,
    pub gateway: Arc<dyn DeliveryGateway>,
    /// Pending "change time" requests, one per owner.
    pub sessions: Arc<dyn EditSessionStore>,
    pub parser: Arc<dyn TimeExpressionParser>,
    pub clock: Arc<dyn Clock>,
}
