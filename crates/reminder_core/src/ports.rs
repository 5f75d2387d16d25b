//! crates/reminder_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reminder lifecycle engine.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the chat transport and the wall clock.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::{
    EditSession, MessageRef, NewReminder, OutboundMessage, OwnerId, Reminder, ReminderId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
/// A mutation that matches nothing is not an error; it reports zero affected rows.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable storage of reminders. Mutations report the number of affected rows;
/// zero means nothing matched and is not an error.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert(&self, reminder: NewReminder) -> PortResult<ReminderId>;

    async fn list_by_owner(&self, owner_id: OwnerId) -> PortResult<Vec<Reminder>>;

    /// Deletes only when the reminder belongs to `owner_id`.
    async fn delete_by_id(&self, id: ReminderId, owner_id: OwnerId) -> PortResult<u64>;

    /// All reminders, across owners, with `fire_at < now`.
    async fn find_due(&self, now: NaiveDateTime) -> PortResult<Vec<Reminder>>;

    async fn update_fire_at(&self, id: ReminderId, fire_at: NaiveDateTime) -> PortResult<u64>;

    /// Deletes every listed id in one statement.
    async fn delete_many(&self, ids: &[ReminderId]) -> PortResult<u64>;

    /// Owner-scoped variant of `update_fire_at`, used by the edit flow.
    async fn set_fire_at(
        &self,
        id: ReminderId,
        owner_id: OwnerId,
        fire_at: NaiveDateTime,
    ) -> PortResult<u64>;
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, owner_id: OwnerId, message: OutboundMessage) -> PortResult<()>;

    /// Replaces the text of a sent message and drops its buttons.
    async fn edit_message(
        &self,
        owner_id: OwnerId,
        message_ref: MessageRef,
        text: &str,
    ) -> PortResult<()>;

    /// Acknowledges a button press so the client stops its spinner.
    async fn answer_interaction(&self, interaction_id: &str) -> PortResult<()>;
}

/// Per-owner edit sessions.
#[async_trait]
pub trait EditSessionStore: Send + Sync {
    /// Overwrites any session the owner already has.
    async fn set(&self, owner_id: OwnerId, session: EditSession);

    async fn get(&self, owner_id: OwnerId) -> Option<EditSession>;

    async fn clear(&self, owner_id: OwnerId);
}

/// Source of the host-local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

//=========================================================================================
// Time Expression Parsing
//=========================================================================================

/// Why free text could not be turned into a fire time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no date or time phrase found")]
    NoTemporalPhrase,
    #[error("the date or time does not exist")]
    InvalidDate,
}

/// A resolved fire time and the text left once the temporal phrase is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTime {
    pub fire_at: NaiveDateTime,
    pub payload: String,
}

/// Turns a natural-language phrase into an absolute, host-local timestamp.
pub trait TimeExpressionParser: Send + Sync {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<ParsedTime, ParseError>;
}
