//! Infrastructure adapters. Implement outbound ports.
//!
//! AI service, SQLite, CSV import, terminal UI. Map errors to DomainError.

pub mod ai;
pub mod import;
pub mod persistence;
pub mod ui;
