//! Domain services.

pub mod audit;
