//! Intent-extraction collaborator: turns a free-text message (plus timetable
//! and date context) into a validated [`rollcall_core::ActionSet`].
//!
//! The model call is a single attempt; malformed or schema-invalid output is
//! a hard failure for that request.

mod client;
mod prompt;

pub use client::{GroqClient, IntentParser, IntentRequest};
