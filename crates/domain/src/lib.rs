//! Domain layer for the DocForge backend.
//!
//! This crate contains:
//! - Domain models (Template, Certificate, Batch, Document, Signature)
//! - The record store collaborator trait
//! - The activity log builder service

pub mod models;
pub mod services;
pub mod store;
