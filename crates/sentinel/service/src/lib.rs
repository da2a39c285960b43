//! # sentinel-service
//!
//! Host process around the Sentinel engine: layered configuration, tracing
//! setup, and the periodic retrain / health-check scheduler used by the
//! `sentineld` binary.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod input;
pub mod scheduler;
pub mod telemetry;

pub use config::{LoggingConfig, SchedulerConfig, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use scheduler::RetrainScheduler;
