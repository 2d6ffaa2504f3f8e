pub mod assignment;
pub mod config;
pub mod deviation;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod event;
pub mod holdover;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod rationale;
pub mod regions;
pub mod relaxed_engine;
pub mod rng;
pub mod scoring;
pub mod snapshot;
pub mod solver;
pub mod stability;
pub mod store;
pub mod strategy;
pub mod synthetic;
pub mod thresholds;
pub mod types;
pub mod waterfall_engine;
