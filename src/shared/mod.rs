//! Cross-cutting concerns shared by adapters and the entry point.

pub mod config;
