//! Workforce safety-training compliance: enrollment, document approval, scoring, and
//! certificate issuance across the document+score and external-link channels.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
