//! Offline-first write queue and sync engine for the field-worker client.
//!
//! Records created while the device is disconnected are persisted in a local
//! SQLite queue and submitted to the clinic API once connectivity returns.
//! The UI layer talks to [`sync::SyncEngine`] (enqueue, status, manual sync)
//! and never touches the store or the network directly.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod model;
pub mod sync;
