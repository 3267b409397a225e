//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the mirror engine:
//! - Logging and tracing infrastructure
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions and event broadcasting mechanisms used
//! throughout the system.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, SyncEvent};
