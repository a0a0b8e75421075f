pub mod config;
pub mod error;
pub mod leasing;
pub mod telemetry;
