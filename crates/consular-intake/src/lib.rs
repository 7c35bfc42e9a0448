//! Core library for the consular service-intake-to-payment pipeline.
//!
//! The intake saga spans two uncoordinated third-party systems (a
//! record-keeping backend and a payment provider) with no shared transaction
//! log. Everything order-sensitive about that saga lives in
//! [`intake::IntakeService`]; the surrounding modules supply configuration,
//! telemetry, and the HTTP-facing error type.

pub mod config;
pub mod error;
pub mod intake;
pub mod telemetry;
