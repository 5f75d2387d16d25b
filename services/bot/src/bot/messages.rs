//! services/bot/src/bot/messages.rs
//!
//! User-facing texts and the rendering of reminders into chat messages.

use chrono::NaiveDateTime;
use reminder_core::domain::{ActionKind, OutboundMessage, RecurrenceKind, Reminder, ReminderAction};

/// How fire times are shown to users.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const HELP: &str = "\
The bot is running. Commands:
/list - show your reminders
/help - show this message

Send a time and a text to create a reminder:
• One-off: 'today at 14:00 meeting', 'tomorrow at 9am call mom', 'in 2 hours check the oven'
• Recurring: 'daily at 9:00 exercise', 'weekly on monday standup', 'monthly on the 1st pay rent'
• По-русски: 'сегодня в 14:00 встреча', 'ежедневно в 9:00 зарядка', 'ежемесячно 1 числа оплата'";

pub const FORMAT_HINT: &str = "\
Could not understand the time. Some formats that work:
 - today at 11:10 {your text}
 - on friday after lunch {your text}
 - next wednesday at 12:25 {your text}
 - in 30 minutes {your text}
 - daily at 9:00 {your text}
 - weekly on monday {your text}
 - monthly on the 1st {your text}
 - сегодня в 11:10 {ваш текст}";

pub const EDIT_PROMPT: &str =
    "Send the new time for this reminder (for example: tomorrow at 15:00 or in 2 hours)";

pub const EDIT_HINT: &str =
    "Could not understand the time. Press \"Change time\" again and send something like: tomorrow at 15:00";

pub const NO_REMINDERS: &str = "You have no active reminders.";
pub const NOT_FOUND: &str = "Nothing matched: that reminder no longer exists.";
pub const DELETED: &str = "✅ Reminder deleted";

pub const LIST_FAILED: &str = "Could not load your reminders. Please try again later.";
pub const SAVE_FAILED: &str = "Could not save the reminder. Please try again later.";
pub const DELETE_FAILED: &str = "Could not delete the reminder. Please try again later.";
pub const UPDATE_FAILED: &str = "Could not update the reminder. Please try again later.";

pub fn format_time(value: NaiveDateTime) -> String {
    value.format(DISPLAY_TIME_FORMAT).to_string()
}

/// Empty for one-off reminders.
pub fn recurrence_label(kind: RecurrenceKind) -> &'static str {
    match kind {
        RecurrenceKind::None => "",
        RecurrenceKind::Daily => "(repeats daily)",
        RecurrenceKind::Weekly => "(repeats weekly)",
        RecurrenceKind::Monthly => "(repeats monthly)",
        RecurrenceKind::Yearly => "(repeats yearly)",
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn fires_at_line(fire_at: NaiveDateTime, kind: RecurrenceKind) -> String {
    let line = format!("Fires at: {} {}", format_time(fire_at), recurrence_label(kind));
    line.trim_end().to_string()
}

/// One `/list` entry with its "Change time" and "Delete" buttons.
pub fn reminder_card(reminder: &Reminder) -> OutboundMessage {
    let kind = if reminder.is_recurring() {
        reminder.recurrence_kind
    } else {
        RecurrenceKind::None
    };
    let text = format!(
        "<blockquote>{}</blockquote>{}",
        html_escape(&reminder.text),
        fires_at_line(reminder.fire_at, kind)
    );
    OutboundMessage::html(text)
        .with_action(
            "Change time",
            ReminderAction {
                kind: ActionKind::Edit,
                reminder_id: reminder.id,
            },
        )
        .with_action(
            "Delete",
            ReminderAction {
                kind: ActionKind::Delete,
                reminder_id: reminder.id,
            },
        )
}

/// Reply to a freshly created reminder.
pub fn confirmation(text: &str, fire_at: NaiveDateTime, kind: RecurrenceKind) -> OutboundMessage {
    OutboundMessage::html(format!(
        "Reminder set: <blockquote>{}</blockquote>{}",
        html_escape(text),
        fires_at_line(fire_at, kind)
    ))
}

pub fn time_updated(fire_at: NaiveDateTime) -> String {
    format!("✅ Reminder time updated to: {}", format_time(fire_at))
}
