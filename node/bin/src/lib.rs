pub mod bundle_backend;
pub mod config;
mod pipeline;

pub use bundle_backend::BundleBackend;
pub use pipeline::QueryPipeline;
