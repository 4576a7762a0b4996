// flowgate/src/pipeline/mod.rs

pub mod definition;
pub mod execution;
pub mod routing;

pub use definition::Pipeline;
pub use routing::{output_flag, RouteBuilder};
