//! Server side of the note RPC: caller extraction, permission checks and
//! persistence.

pub mod caller;
pub mod handlers;
pub mod pg_store;
pub mod service;
pub mod store;
