pub mod extractor;
pub mod generation;
pub mod handlers;
pub mod prompts;
pub mod scenario;
pub mod scoring;
pub mod session;
pub mod sink;
pub mod store;
pub mod tradeoff;
