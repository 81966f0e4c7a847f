//! `DoseWatch` - medication ingestion verification
//!
//! A frame-by-frame protocol engine that decides whether a patient really
//! swallowed their medication. Per-frame observations from the detection
//! layer drive a six-phase state machine per session; the session manager
//! runs many sessions at once and persists each verdict to an audit sink.

pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod observability;
pub mod observation;
pub mod protocol;
pub mod session;
