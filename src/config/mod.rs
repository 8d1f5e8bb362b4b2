//! # slidemap Configuration Module
//!
//! This module centralizes all configuration constants for slidemap. Header
//! layout and view sizing values are interdependent, so they live together
//! and their relationships are enforced through compile-time assertions.
//!
//! Per-window settings (map range, view size, protection, access advice) are
//! configured through [`crate::window::WindowConfig`], whose defaults come from
//! here.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
