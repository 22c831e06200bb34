//! Switchboard - call session orchestration
//!
//! Drives 1:1 and group calls through a single serialized state machine.
//! The media engine, signaling transport, call history and platform audio
//! controls are collaborators behind traits.

pub mod config;
pub mod db;
pub mod engine;
pub mod runtime;
pub mod signaling;
pub mod state_machine;
