//! Durable queue store backed by SQLite.
//!
//! The `queue` table is the single source of truth for "not yet confirmed by
//! the server" state: an item leaves it only when a sync pass claims it, and
//! comes back via `push_back` unless the server acknowledged it. All
//! multi-step operations run inside a transaction so a crash never leaves a
//! half-written queue.

pub mod repo;

pub use repo::*;
