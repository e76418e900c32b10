pub mod loader;
pub mod pipeline;
pub mod progress;
