pub mod domain;
pub mod edit_session;
pub mod ports;
pub mod recurrence;
pub mod scheduler;
pub mod time_phrase;

pub use domain::{
    ActionButton, ActionKind, Disposition, EditAction, EditSession, InboundEvent, MessageRef,
    NewReminder, OutboundMessage, OwnerId, RecurrenceKind, Reminder, ReminderAction, ReminderId,
    TextFormat,
};
pub use edit_session::InMemoryEditSessions;
pub use ports::{
    Clock, DeliveryGateway, EditSessionStore, ParseError, ParsedTime, PortError, PortResult,
    ReminderStore, TimeExpressionParser,
};
pub use recurrence::{classify, Classification};
pub use scheduler::{Scheduler, TickReport};
pub use time_phrase::PhraseParser;
