//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API, built on `teloxide`.
//! It implements the `DeliveryGateway` port from the `core` crate and turns
//! `getUpdates` long polling into a stream of `InboundEvent`s for the conversation
//! handler.

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reminder_core::domain::{
    ActionButton, InboundEvent, MessageRef, OutboundMessage, OwnerId, TextFormat,
};
use reminder_core::ports::{DeliveryGateway, PortError, PortResult};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
    Update, UpdateKind,
};
use teloxide::RequestError;
use tracing::{debug, warn};
use url::Url;

/// Pause after a failed poll before asking again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Headroom on top of the long-poll timeout for the HTTP request itself.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `DeliveryGateway` port using the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    poll_timeout: Duration,
}

impl TelegramGateway {
    /// Creates a new `TelegramGateway`.
    ///
    /// The HTTP client timeout is stretched past `poll_timeout` so that long polls
    /// are not cut short.
    pub fn new(api_url: Url, token: &str, poll_timeout: Duration) -> PortResult<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        let bot = Bot::with_client(token, client).set_api_url(api_url);
        Ok(Self { bot, poll_timeout })
    }

    /// Long-polls for updates forever, yielding each text message or button press.
    ///
    /// Transport errors are logged and the poll is retried after a short pause.
    /// Updates carrying neither text nor callback data are acknowledged and skipped.
    pub fn updates(&self) -> impl Stream<Item = InboundEvent> + Send + 'static {
        let bot = self.bot.clone();
        let timeout = u32::try_from(self.poll_timeout.as_secs()).unwrap_or(u32::MAX);

        stream::unfold(0_i32, move |offset| {
            let bot = bot.clone();
            async move {
                let batch = match bot
                    .get_updates()
                    .offset(offset)
                    .timeout(timeout)
                    .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
                    .await
                {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!(error = %e, "Polling Telegram for updates failed");
                        tokio::time::sleep(RETRY_DELAY).await;
                        Vec::new()
                    }
                };

                let next_offset = batch.iter().map(|u| u.id + 1).fold(offset, i32::max);
                let events: Vec<InboundEvent> = batch
                    .into_iter()
                    .filter_map(|update| {
                        let update_id = update.id;
                        let event = to_event(update);
                        if event.is_none() {
                            debug!(update_id, "Skipping update without text or callback data");
                        }
                        event
                    })
                    .collect();
                Some((stream::iter(events), next_offset))
            }
        })
        .flatten()
    }
}

fn map_err(e: RequestError) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Converts a Telegram update into the event the handler understands.
fn to_event(update: Update) -> Option<InboundEvent> {
    match update.kind {
        UpdateKind::Message(message) => Some(InboundEvent::Text {
            owner_id: message.chat.id.0,
            text: message.text()?.to_string(),
        }),
        UpdateKind::CallbackQuery(query) => {
            let action_id = query.data?;
            // Reminders belong to the chat the button was shown in.
            let (owner_id, message_ref) = match query.message {
                Some(message) => (message.chat.id.0, Some(MessageRef::from(message.id.0))),
                None => (i64::try_from(query.from.id.0).ok()?, None),
            };
            Some(InboundEvent::Action {
                owner_id,
                interaction_id: query.id,
                message_ref,
                action_id,
            })
        }
        _ => None,
    }
}

/// All buttons of a message go on a single keyboard row.
fn keyboard(actions: &[ActionButton]) -> Option<InlineKeyboardMarkup> {
    if actions.is_empty() {
        return None;
    }
    let row: Vec<InlineKeyboardButton> = actions
        .iter()
        .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.to_string()))
        .collect();
    Some(InlineKeyboardMarkup::new(vec![row]))
}

//=========================================================================================
// `DeliveryGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl DeliveryGateway for TelegramGateway {
    async fn send(&self, owner_id: OwnerId, message: OutboundMessage) -> PortResult<()> {
        let markup = keyboard(&message.actions);
        let mut request = self.bot.send_message(ChatId(owner_id), message.text);
        if message.format == TextFormat::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        request.await.map(|_| ()).map_err(map_err)
    }

    async fn edit_message(
        &self,
        owner_id: OwnerId,
        message_ref: MessageRef,
        text: &str,
    ) -> PortResult<()> {
        let message_id = i32::try_from(message_ref)
            .map_err(|_| PortError::Unexpected(format!("Invalid message id {}", message_ref)))?;
        self.bot
            .edit_message_text(ChatId(owner_id), MessageId(message_id), text)
            .reply_markup(InlineKeyboardMarkup::new(Vec::<Vec<InlineKeyboardButton>>::new()))
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn answer_interaction(&self, interaction_id: &str) -> PortResult<()> {
        self.bot
            .answer_callback_query(interaction_id)
            .await
            .map(|_| ())
            .map_err(map_err)
    }
}
