//! Gateway: the HTTP side of the relay.
//!
//! Single port serves the LINE webhook (`POST /callback`) and health probes.
//! Each webhook call is verified, logged, and processed to completion before the
//! response is returned.

mod context;
mod events;
mod server;

pub use context::AppContext;
pub use events::{EventHandler, EventTable, HandlerFuture};
pub use server::{router, run_gateway};
