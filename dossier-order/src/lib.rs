pub mod pipeline;
pub mod service;

pub use pipeline::{FulfillmentPipeline, PipelineOutcome};
pub use service::{FulfillmentQueue, OrderService, StatusView};
