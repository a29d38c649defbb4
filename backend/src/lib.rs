//! Identity schema adaptation and migration engine for the embedded chat
//! service.
//!
//! The host application owns a user table of arbitrary shape. This crate
//! maps the chat's three identity fields onto it, extends or creates the
//! table under approval, records what it changed, and reverses exactly that.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
