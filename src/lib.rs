//! Webhook Sensor - bridges pull request webhooks into a record store and a
//! durable message bus.
//!
//! Each delivery is archived verbatim, reduced to a provider-agnostic pull
//! request snapshot, upserted by `(host, external id)` and announced on
//! `ORCHESTRATOR.WEBHOOK_EVENT`.

pub mod archive;
pub mod config;
pub mod notify;
pub mod persistence;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
