//! Reply delivery seam between the gateway and a messaging channel.

use async_trait::async_trait;

/// Sends reply messages for an inbound event.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    /// Send `messages` as one reply keyed by `reply_token`. The channel enforces its own
    /// per-reply cap; callers should not rely on extra messages being delivered.
    async fn reply(&self, reply_token: &str, messages: &[String]) -> Result<(), String>;
}
