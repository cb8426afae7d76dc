//! Event enrichment, batching and delivery.
//!
//! # DATA FLOW
//! Source -> `Signal` -> `AgentCore::ingest` (builder, sampler, detector) ->
//! `EventQueue` -> `Batch` -> `DeliveryManager` -> requeue at front on failure.
//!
//! # ORDERING INVARIANT
//! At most one batch is in flight per agent. Envelopes reach the backend in the
//! order they were enqueued, across batches and across failed attempts.

pub mod agent;
pub mod breadcrumbs;
pub mod builder;
pub mod config;
pub mod delivery;
pub mod event;
pub mod host;
pub mod identity;
pub mod interaction;
pub mod pipeline;
pub mod queue;
pub mod rating;
pub mod sampling;
pub mod source;
pub mod stats;
