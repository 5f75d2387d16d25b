//! crates/reminder_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reminder bot.
//! These structs are independent of any database, chat transport or wire format.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of the conversation that owns a reminder (a Telegram chat id).
pub type OwnerId = i64;

/// Store-assigned reminder identifier.
pub type ReminderId = i64;

/// How a reminder repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceKind {
    /// The stable string stored in the `repeat_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceKind::None => "none",
            RecurrenceKind::Daily => "daily",
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::Monthly => "monthly",
            RecurrenceKind::Yearly => "yearly",
        }
    }

    /// Parses a stored `repeat_type`. Unrecognized values yield `None`.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(RecurrenceKind::None),
            "daily" => Some(RecurrenceKind::Daily),
            "weekly" => Some(RecurrenceKind::Weekly),
            "monthly" => Some(RecurrenceKind::Monthly),
            "yearly" => Some(RecurrenceKind::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub owner_id: OwnerId,
    pub text: String,
    pub fire_at: NaiveDateTime,
    pub recurrence_kind: RecurrenceKind,
    pub recurrence_enabled: bool,
}

impl Reminder {
    /// A reminder repeats only when the flag is set and the kind is not `None`.
    pub fn is_recurring(&self) -> bool {
        self.recurrence_enabled && self.recurrence_kind != RecurrenceKind::None
    }

    /// Strictly due once `now` has passed the fire time.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.fire_at < now
    }
}

/// Everything needed to insert a reminder; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub owner_id: OwnerId,
    pub text: String,
    pub fire_at: NaiveDateTime,
    pub recurrence_kind: RecurrenceKind,
    pub recurrence_enabled: bool,
}

/// What the scheduler does with a reminder after delivering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete,
    Reschedule(NaiveDateTime),
}

//=========================================================================================
// Edit Sessions
//=========================================================================================

/// The pending interaction recorded for an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Edit,
}

/// Marks that the owner's next text message is a new fire time for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditSession {
    pub action: EditAction,
    pub target_reminder_id: ReminderId,
}

impl EditSession {
    pub fn edit(target_reminder_id: ReminderId) -> Self {
        Self {
            action: EditAction::Edit,
            target_reminder_id,
        }
    }
}

//=========================================================================================
// Interactive Actions
//=========================================================================================

/// The two actions attached to every listed reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Edit,
    Delete,
}

impl ActionKind {
    fn prefix(&self) -> &'static str {
        match self {
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
        }
    }
}

/// An action id carried by an inline button, encoded as `"<kind>_<id>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderAction {
    pub kind: ActionKind,
    pub reminder_id: ReminderId,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Malformed action id: {0:?}")]
pub struct ActionIdError(pub String);

impl fmt::Display for ReminderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.reminder_id)
    }
}

impl FromStr for ReminderAction {
    type Err = ActionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('_')
            .ok_or_else(|| ActionIdError(s.to_string()))?;
        let kind = match prefix {
            "edit" => ActionKind::Edit,
            "delete" => ActionKind::Delete,
            _ => return Err(ActionIdError(s.to_string())),
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ActionIdError(s.to_string()));
        }
        let reminder_id = id
            .parse::<ReminderId>()
            .map_err(|_| ActionIdError(s.to_string()))?;
        Ok(Self { kind, reminder_id })
    }
}

//=========================================================================================
// Messages Crossing the Delivery Gateway
//=========================================================================================

/// How the gateway should interpret the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// A labeled button that carries a reminder action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    pub action: ReminderAction,
}

/// A message to deliver to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub text: String,
    pub format: TextFormat,
    pub actions: Vec<ActionButton>,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Html,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, action: ReminderAction) -> Self {
        self.actions.push(ActionButton {
            label: label.into(),
            action,
        });
        self
    }
}

/// Transport reference to a previously sent message (Telegram `message_id`).
pub type MessageRef = i64;

/// Something the user did in the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text {
        owner_id: OwnerId,
        text: String,
    },
    Action {
        owner_id: OwnerId,
        interaction_id: String,
        message_ref: Option<MessageRef>,
        action_id: String,
    },
}
