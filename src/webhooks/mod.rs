//! Webhook payload handling.
//!
//! - [`extract`]: provider payload to [`PrSnapshot`](crate::types::PrSnapshot)
//! - [`pipeline`]: the end-to-end processing of one delivery

pub mod extract;
pub mod pipeline;

pub use extract::{ExtractionError, FieldPaths, GITHUB_FIELDS, extract, extract_value};
pub use pipeline::{PipelineError, Processed, WebhookPipeline};
