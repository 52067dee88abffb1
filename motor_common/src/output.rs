//! Output hardware types, capability traits and configuration.
//!
//! This module contains everything the output subsystem shares with
//! hardware-family implementations and configuration tooling.

pub mod channel;
pub mod config;
pub mod digital;
pub mod types;
