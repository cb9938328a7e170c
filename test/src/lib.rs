pub mod test_objects;

pub use helpers::*;
pub use test_objects::{Counter, Journal, Settings};
