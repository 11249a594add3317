//! Infrastructure layer: Redis adapters, worker runtime, gateways, config.

pub mod config;
pub mod gateway;
pub mod job_queue;
pub mod result_store;
pub mod retry;
pub mod worker;

mod integration_tests;
