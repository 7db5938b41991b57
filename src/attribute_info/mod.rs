pub mod parser;
pub mod types;

pub use self::types::*;
