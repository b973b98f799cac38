//! Messaging channel (LINE).
//!
//! Webhook payload types, signature verification, and the reply sink the gateway
//! uses to answer an inbound message.

mod inbound;
mod line;
mod reply;

pub use inbound::InboundMessage;
pub use line::{
    sign_body, verify_signature, LineClient, LineError, LineMessage, LineSource, WebhookBody,
    WebhookEvent, SIGNATURE_HEADER,
};
pub use reply::ReplySink;
