//! # Motor Output Library
//!
//! Motor, servo and beeper pulse generation for a flight controller, with a
//! pluggable timer backend.
//!
//! Backends implement the `TimerBackend` trait defined in
//! `motor_common::output::channel`; DShot-capable backends also hand out a
//! `DigitalEncoder`.
//!
//! # Module Structure
//!
//! - [`core`] - MotorOutput struct, init and per-cycle write/commit
//! - [`binder`] - Timer channel binding and shared-timer restart ownership
//! - [`encoder`] - Analog pulse encoders
//! - [`port`] - Output ports and fixed-capacity port tables
//! - [`protocol`] - Protocol selection (writer, commit, time base)
//! - [`coordinator`] - Per-cycle commit strategies
//! - [`command`] - DShot command injection
//! - [`disarm`] - Cross-thread disarm handle
//! - [`servo`] / [`beeper`] - Auxiliary outputs
//! - [`timer_map`] - Board timer map lookup
//! - [`backend_registry`] - Backend factory registration
//! - [`drivers`] - Timer backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       motor_output                               │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │   Mixer     │───►│ MotorOutput  │◄───│  Backend Registry   │  │
//! │  │ (caller)    │    │ write/commit │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │                            ▼                                     │
//! │          ┌────────────────┐   ┌────────────────┐                 │
//! │          │ TimerChannel   │   │ DigitalEncoder │ (trait objects) │
//! │          └────────────────┘   └────────────────┘                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod backend_registry;
pub mod beeper;
pub mod binder;
pub mod command;
pub mod coordinator;
pub mod core;
pub mod disarm;
pub mod drivers;
pub mod encoder;
pub mod port;
pub mod protocol;
pub mod servo;
pub mod timer_map;

// Re-export key types for convenience
pub use crate::backend_registry::BackendRegistry;
pub use crate::core::MotorOutput;
pub use crate::disarm::DisarmHandle;
pub use crate::coordinator::CommitMode;
pub use crate::encoder::PulseEncoding;
pub use crate::protocol::{ProtocolSelection, PulseWriter, select_protocol};
