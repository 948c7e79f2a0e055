//! Shared utilities for the DocForge backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Authenticated encryption for stored secrets
//! - Filesystem path containment checks
//! - Filename sanitization

pub mod path_guard;
pub mod sanitize;
pub mod secret;
