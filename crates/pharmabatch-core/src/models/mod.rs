//! Domain models for the reception pipeline.

mod product;
mod reception;

pub use product::*;
pub use reception::*;
