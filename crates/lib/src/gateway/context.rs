//! Application context: everything a webhook call needs, built once at startup.

use crate::applog::AppendLog;
use crate::channels::{LineClient, ReplySink};
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::gateway::events::EventTable;
use crate::search::SearchClient;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Shared, immutable state passed to every handler.
pub struct AppContext {
    pub settings: Settings,
    pub dispatcher: Dispatcher,
    /// Where replies go (LINE in production).
    pub replies: Arc<dyn ReplySink>,
    /// Every verified webhook body.
    pub events_log: AppendLog,
    /// Event type tag -> handler.
    pub handlers: EventTable,
}

impl AppContext {
    /// Wire up the production clients from validated settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let search = SearchClient::new(&settings.search).context("building search client")?;
        let dispatcher = Dispatcher::new(search, AppendLog::new(settings.search_log.clone()));
        let replies: Arc<dyn ReplySink> = Arc::new(LineClient::new(
            settings.line_api_base.clone(),
            settings.channel_access_token.clone(),
        ));
        Ok(Self::new(settings, dispatcher, replies))
    }

    /// Build with an explicit dispatcher and reply sink, using the default event table.
    pub fn new(settings: Settings, dispatcher: Dispatcher, replies: Arc<dyn ReplySink>) -> Self {
        let events_log = AppendLog::new(settings.events_log.clone());
        Self {
            settings,
            dispatcher,
            replies,
            events_log,
            handlers: EventTable::with_defaults(),
        }
    }
}
