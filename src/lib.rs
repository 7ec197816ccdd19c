//! claim-audit: Review analysis and marketing-claim contradiction detection with
//! Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
