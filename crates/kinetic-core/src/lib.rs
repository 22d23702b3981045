//! # Kinetic-Core
//!
//! Core types and utilities for Kinetic-DINO, a self-distillation training
//! system for multi-frame composite camera images.

pub mod config;
pub mod error;
pub mod schedule;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use schedule::*;
pub use types::*;
