//! Pingora front door for the admin API: serves password login and guards
//! privileged routes with bearer tokens and per-route rate limits.

pub mod client;
pub mod configuration;
pub mod gate;
pub mod metric;
pub mod server;
pub mod store;
pub mod sweeper;
