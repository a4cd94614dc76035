//! State module for tracking worker progress
//!
//! `WorkerState` is the per-worker cycle state machine driven by the
//! crawl coordinator. It is owned by each worker; nothing here is shared.

mod worker_state;

pub use worker_state::WorkerState;
