//! Motor Output Common Library
//!
//! This crate provides shared constants, hardware capability traits and
//! configuration loading for the motor output workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Table capacities, timer clocks and DShot limits
//! - [`config`] - Configuration loading traits and types
//! - [`output`] - Timer/encoder traits, hardware types and output config
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use motor_common::prelude::*;
//!
//! let tag: IoTag = "PA8".parse().unwrap();
//! assert_eq!(tag.to_string(), "PA8");
//! ```

pub mod config;
pub mod consts;
pub mod output;
pub mod prelude;
