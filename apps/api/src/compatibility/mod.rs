// Compatibility scoring engine.
// Implements: prompt building, model cascade, output validation, score aggregation,
// optional analysis cache, and the caller-side escalation policy.
// All model calls go through llm_client::ModelInvoker; no direct HTTP here.

pub mod aggregator;
pub mod cache;
pub mod cascade;
pub mod estimate;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod service;
pub mod telemetry;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;
