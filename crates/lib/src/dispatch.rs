//! Text command dispatch: help, ping, echo, and /yelp forwarding.

use crate::applog::AppendLog;
use crate::compose::compose_reply;
use crate::search::SearchClient;

pub const HELP_TEXT: &str = "Commands:\n\
- help: show this help\n\
- ping: test latency\n\
- echo <text>: I'll repeat your text\n\
- /yelp <query>: ask Yelp AI (e.g. /yelp good vegan sushi in SF)";

pub const PONG_TEXT: &str = "pong 🏓";

pub const YELP_USAGE_TEXT: &str = "Usage: /yelp <your question>\nExample: /yelp Best ramen near me";

const YELP_COMMAND: &str = "/yelp";

/// What an inbound text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    /// Text after "echo ", original casing kept.
    Echo(String),
    /// "/yelp" with nothing after it.
    YelpUsage,
    Yelp(String),
    /// No reply at all.
    Ignore,
}

impl Command {
    /// Classify a message. Keywords are case-insensitive; surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if lower == "help" {
            return Command::Help;
        }
        if lower == "ping" {
            return Command::Ping;
        }
        if lower.starts_with("echo ") {
            // "echo " is ASCII, so byte offset 5 is a char boundary in `trimmed` too
            return Command::Echo(trimmed[5..].to_string());
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("");
        if first.eq_ignore_ascii_case(YELP_COMMAND) {
            let query = parts.next().unwrap_or("").trim();
            if query.is_empty() {
                return Command::YelpUsage;
            }
            return Command::Yelp(query.to_string());
        }

        Command::Ignore
    }
}

/// Runs commands against the search API. Shared by the webhook and the CLI.
#[derive(Clone)]
pub struct Dispatcher {
    search: SearchClient,
    search_log: AppendLog,
}

impl Dispatcher {
    pub fn new(search: SearchClient, search_log: AppendLog) -> Self {
        Self { search, search_log }
    }

    /// Outbound messages for `text`. Empty means "send nothing".
    pub async fn handle(&self, text: &str) -> Vec<String> {
        match Command::parse(text) {
            Command::Help => vec![HELP_TEXT.to_string()],
            Command::Ping => vec![PONG_TEXT.to_string()],
            Command::Echo(rest) => vec![rest],
            Command::YelpUsage => vec![YELP_USAGE_TEXT.to_string()],
            Command::Yelp(query) => self.forward(&query).await,
            Command::Ignore => Vec::new(),
        }
    }

    async fn forward(&self, query: &str) -> Vec<String> {
        match self.search.query(query).await {
            Ok(doc) => {
                self.search_log.append_json(&doc).await;
                compose_reply(&doc)
            }
            Err(e) => {
                log::warn!("yelp query failed: {}", e);
                vec![e.reply_text()]
            }
        }
    }
}
