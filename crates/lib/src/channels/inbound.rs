//! Inbound message from LINE: the text to dispatch and the token to answer it with.

/// One text message from a LINE webhook event. Lives only for the webhook call.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// User, group, or room id the message came from.
    pub conversation_id: String,
    pub text: String,
    /// Single-use reply token issued by LINE for this event.
    pub reply_token: String,
}
