//! services/bot/src/bot/handler.rs
//!
//! Routes inbound chat events to the reminder flows.
//!
//! Every text first checks the owner's edit session. Without one, the text is a
//! command (`/start`, `/help`, `/list`) or a new reminder. Button presses carry a
//! `ReminderAction` id and either delete a reminder or open an edit session.

use crate::bot::messages;
use crate::bot::state::AppState;
use reminder_core::domain::{
    ActionKind, EditSession, InboundEvent, MessageRef, NewReminder, OutboundMessage, OwnerId,
    ReminderAction,
};
use reminder_core::ports::PortResult;
use reminder_core::recurrence::classify;
use tracing::{debug, error, info, warn};

/// Handles one inbound event. Failures to reply are logged, never propagated.
pub async fn handle_event(state: &AppState, event: InboundEvent) {
    let (owner_id, result) = match event {
        InboundEvent::Text { owner_id, text } => {
            (owner_id, handle_text(state, owner_id, &text).await)
        }
        InboundEvent::Action {
            owner_id,
            interaction_id,
            message_ref,
            action_id,
        } => (
            owner_id,
            handle_action(state, owner_id, &interaction_id, message_ref, &action_id).await,
        ),
    };

    if let Err(e) = result {
        error!(owner_id, error = %e, "Failed to reply to the user");
    }
}

//=========================================================================================
// Text Messages
//=========================================================================================

async fn handle_text(state: &AppState, owner_id: OwnerId, text: &str) -> PortResult<()> {
    // A pending edit consumes this message whatever it contains.
    if let Some(session) = state.sessions.get(owner_id).await {
        state.sessions.clear(owner_id).await;
        return apply_edit(state, owner_id, session, text).await;
    }

    let text = text.trim();
    match command(text) {
        Some("/start") | Some("/help") => reply(state, owner_id, messages::HELP).await,
        Some("/list") => list_reminders(state, owner_id).await,
        Some("/add") => create_reminder(state, owner_id, strip_command(text)).await,
        _ => create_reminder(state, owner_id, text).await,
    }
}

/// The leading `/command`, without any `@botname` suffix.
fn command(text: &str) -> Option<&str> {
    let head = text.split_whitespace().next()?;
    if !head.starts_with('/') {
        return None;
    }
    head.split('@').next()
}

fn strip_command(text: &str) -> &str {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

async fn list_reminders(state: &AppState, owner_id: OwnerId) -> PortResult<()> {
    let reminders = match state.store.list_by_owner(owner_id).await {
        Ok(reminders) => reminders,
        Err(e) => {
            error!(owner_id, error = %e, "Failed to list reminders");
            return reply(state, owner_id, messages::LIST_FAILED).await;
        }
    };

    if reminders.is_empty() {
        return reply(state, owner_id, messages::NO_REMINDERS).await;
    }
    for reminder in &reminders {
        state
            .gateway
            .send(owner_id, messages::reminder_card(reminder))
            .await?;
    }
    Ok(())
}

async fn create_reminder(state: &AppState, owner_id: OwnerId, text: &str) -> PortResult<()> {
    let classification = classify(text);
    let now = state.clock.now();

    let parsed = match state.parser.parse(&classification.cleaned_text, now) {
        Ok(parsed) if !parsed.payload.is_empty() => parsed,
        Ok(_) => {
            debug!(owner_id, "Reminder text is empty once the time is removed");
            return reply(state, owner_id, messages::FORMAT_HINT).await;
        }
        Err(e) => {
            debug!(owner_id, error = %e, "Could not parse a reminder time");
            return reply(state, owner_id, messages::FORMAT_HINT).await;
        }
    };

    let new_reminder = NewReminder {
        owner_id,
        text: parsed.payload,
        fire_at: parsed.fire_at,
        recurrence_kind: classification.kind,
        recurrence_enabled: classification.enabled,
    };
    let confirmation = messages::confirmation(
        &new_reminder.text,
        new_reminder.fire_at,
        new_reminder.recurrence_kind,
    );

    match state.store.insert(new_reminder).await {
        Ok(reminder_id) => {
            info!(
                reminder_id,
                owner_id,
                recurrence = %classification.kind,
                "Reminder created"
            );
            state.gateway.send(owner_id, confirmation).await
        }
        Err(e) => {
            error!(owner_id, error = %e, "Failed to save reminder");
            reply(state, owner_id, messages::SAVE_FAILED).await
        }
    }
}

async fn apply_edit(
    state: &AppState,
    owner_id: OwnerId,
    session: EditSession,
    text: &str,
) -> PortResult<()> {
    let reminder_id = session.target_reminder_id;
    let fire_at = match state.parser.parse(text, state.clock.now()) {
        Ok(parsed) => parsed.fire_at,
        Err(e) => {
            debug!(owner_id, reminder_id, error = %e, "Could not parse the new time");
            return reply(state, owner_id, messages::EDIT_HINT).await;
        }
    };

    match state.store.set_fire_at(reminder_id, owner_id, fire_at).await {
        Ok(0) => reply(state, owner_id, messages::NOT_FOUND).await,
        Ok(_) => {
            info!(reminder_id, owner_id, %fire_at, "Reminder time changed");
            reply(state, owner_id, &messages::time_updated(fire_at)).await
        }
        Err(e) => {
            error!(owner_id, reminder_id, error = %e, "Failed to update reminder time");
            reply(state, owner_id, messages::UPDATE_FAILED).await
        }
    }
}

//=========================================================================================
// Button Presses
//=========================================================================================

async fn handle_action(
    state: &AppState,
    owner_id: OwnerId,
    interaction_id: &str,
    message_ref: Option<MessageRef>,
    action_id: &str,
) -> PortResult<()> {
    // Acknowledge first so the client stops its spinner even if the rest fails.
    if let Err(e) = state.gateway.answer_interaction(interaction_id).await {
        warn!(owner_id, error = %e, "Failed to answer interaction");
    }

    let action = match action_id.parse::<ReminderAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(owner_id, error = %e, "Ignoring button press");
            return Ok(());
        }
    };
    let reminder_id = action.reminder_id;

    match action.kind {
        ActionKind::Delete => match state.store.delete_by_id(reminder_id, owner_id).await {
            Ok(0) => reply(state, owner_id, messages::NOT_FOUND).await,
            Ok(_) => {
                info!(reminder_id, owner_id, "Reminder deleted");
                match message_ref {
                    Some(message_ref) => {
                        state
                            .gateway
                            .edit_message(owner_id, message_ref, messages::DELETED)
                            .await
                    }
                    None => reply(state, owner_id, messages::DELETED).await,
                }
            }
            Err(e) => {
                error!(owner_id, reminder_id, error = %e, "Failed to delete reminder");
                reply(state, owner_id, messages::DELETE_FAILED).await
            }
        },
        ActionKind::Edit => {
            state
                .sessions
                .set(owner_id, EditSession::edit(reminder_id))
                .await;
            debug!(owner_id, reminder_id, "Awaiting a new time");
            reply(state, owner_id, messages::EDIT_PROMPT).await
        }
    }
}

async fn reply(state: &AppState, owner_id: OwnerId, text: &str) -> PortResult<()> {
    state
        .gateway
        .send(owner_id, OutboundMessage::plain(text))
        .await
}
