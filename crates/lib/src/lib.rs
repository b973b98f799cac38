//! Linebridge core library: LINE webhook gateway, command dispatch, Yelp AI search,
//! reply composition, and traffic logs. Used by the `linebridge` CLI.

pub mod applog;
pub mod channels;
pub mod chunk;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod gateway;
pub mod search;
