pub mod cli;
pub mod generator;

pub use cli::*;
pub use generator::{DatasetGenerator, GeneratedRow, PRODUCT_TYPES};
