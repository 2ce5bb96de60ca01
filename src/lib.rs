//! Re-publishes vendor security advisories as Atom and JSON feeds.
//!
//! A request names a source and its parameters; [`handler::handle`] fetches
//! the upstream document, normalizes each record into a
//! [`feed::FeedEntry`], and renders the result. [`server`] exposes that over
//! HTTP.

pub mod config;
pub mod feed;
pub mod fetch;
pub mod handler;
pub mod normalize;
pub mod record;
pub mod server;
pub mod source;
pub mod util;
