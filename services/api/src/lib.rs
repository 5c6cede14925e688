//! Voxbridge API Library Crate
//!
//! This library contains all the logic for the voice conversation service:
//! connection negotiation, the per-session conversational pipeline, speech
//! service adapters, and routing. The `api` binary is a thin wrapper around
//! this library.

pub mod audio;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod services;
pub mod state;
pub mod tools;
pub mod transport;
