//! Turn a Yelp AI chat response into the outgoing LINE text messages.
//!
//! A reply holds at most [`MAX_REPLY_MESSAGES`] messages: one lead message with the
//! natural-language answer, then the first business as chunked JSON. Chunks past the
//! cap are dropped; no single message is cut short to make room.

use crate::chunk::chunk_text;
use crate::extract::first_business;
use serde_json::Value;

/// Chunk size for JSON bodies (LINE allows 5000 per text message). The first business
/// message carries the label on top of a full chunk, so it can run past this.
pub const MAX_MESSAGE_CHARS: usize = 3500;

/// LINE accepts at most five messages per reply token.
pub const MAX_REPLY_MESSAGES: usize = 5;

const FALLBACK_LEAD: &str = "Yelp did not return a text response.";
const LEAD_SUFFIX: &str = "\n\n(Full response logged; showing only the first business.)";
const BUSINESS_LABEL: &str = "First business (full JSON):\n";
const NO_BUSINESS_PREFIX: &str = "No businesses found in entities. Raw response:\n";
const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Keep the first `max_chars` chars of `s`, appending a marker when anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((offset, _)) => format!("{}{}", &s[..offset], TRUNCATION_MARKER),
        None => s.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn lead_message(doc: &Value) -> String {
    let text = doc
        .get("response")
        .and_then(|r| r.get("text"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(FALLBACK_LEAD);
    format!("{}{}", text, LEAD_SUFFIX)
}

/// Build the reply messages for a search response. Never returns more than
/// [`MAX_REPLY_MESSAGES`] entries.
pub fn compose_reply(doc: &Value) -> Vec<String> {
    let mut messages = vec![lead_message(doc)];

    match first_business(doc) {
        Some(business) => {
            let room = MAX_REPLY_MESSAGES - messages.len();
            let chunks = chunk_text(&pretty(business), MAX_MESSAGE_CHARS);
            for (i, chunk) in chunks.into_iter().take(room).enumerate() {
                if i == 0 {
                    messages.push(format!("{}{}", BUSINESS_LABEL, chunk));
                } else {
                    messages.push(chunk);
                }
            }
        }
        None => {
            let raw = truncate_chars(&pretty(doc), MAX_MESSAGE_CHARS);
            messages.push(format!("{}{}", NO_BUSINESS_PREFIX, raw));
        }
    }

    messages
}
