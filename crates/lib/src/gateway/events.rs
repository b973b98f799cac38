//! Webhook event dispatch table: event type tag -> handler.

use crate::channels::{InboundMessage, WebhookEvent};
use crate::gateway::context::AppContext;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handles one webhook event. `request_id` tags log lines for the webhook call.
pub type EventHandler = fn(Arc<AppContext>, WebhookEvent, String) -> HandlerFuture;

/// Fixed at startup; read-only afterwards.
pub struct EventTable {
    handlers: HashMap<&'static str, EventHandler>,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Table with the handlers the relay ships with ("message").
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register("message", message_event);
        table
    }

    pub fn register(&mut self, event_type: &'static str, handler: EventHandler) {
        self.handlers.insert(event_type, handler);
    }

    pub fn get(&self, event_type: &str) -> Option<EventHandler> {
        self.handlers.get(event_type).copied()
    }
}

fn message_event(ctx: Arc<AppContext>, event: WebhookEvent, request_id: String) -> HandlerFuture {
    Box::pin(async move {
        let Some(message) = event.message else {
            return;
        };
        match message.typ.as_str() {
            "text" => {}
            "image" => {
                log::info!("[{}] image received, ignoring", request_id);
                return;
            }
            other => {
                log::debug!("[{}] ignoring {} message", request_id, other);
                return;
            }
        }
        let Some(reply_token) = event.reply_token.filter(|t| !t.is_empty()) else {
            log::debug!("[{}] text message without reply token", request_id);
            return;
        };
        let conversation_id = event
            .source
            .as_ref()
            .and_then(|s| s.conversation_id())
            .unwrap_or("")
            .to_string();
        let inbound = InboundMessage {
            conversation_id,
            text: message.text.unwrap_or_default(),
            reply_token,
        };
        process_inbound_message(&ctx, inbound, &request_id).await;
    })
}

/// Dispatch one text message and send whatever it produced as a single reply.
async fn process_inbound_message(ctx: &AppContext, msg: InboundMessage, request_id: &str) {
    log::info!(
        "[{}] text from {}: {}",
        request_id,
        if msg.conversation_id.is_empty() { "unknown" } else { msg.conversation_id.as_str() },
        msg.text
    );
    let replies = ctx.dispatcher.handle(&msg.text).await;
    if replies.is_empty() {
        log::debug!("[{}] no command matched; not replying", request_id);
        return;
    }
    match ctx.replies.reply(&msg.reply_token, &replies).await {
        Ok(()) => log::info!(
            "[{}] replied with {} message(s) via {}",
            request_id,
            replies.len(),
            ctx.replies.id()
        ),
        Err(e) => log::warn!("[{}] reply via {} failed: {}", request_id, ctx.replies.id(), e),
    }
}
