//! Domain types for the voice conversation service: the per-session turn
//! log, the reasoning abstraction over chat completion APIs, and the tool
//! invocation bridge. Transport and HTTP concerns live in the service crate.

pub mod context;
pub mod reasoner;
pub mod tools;
