pub mod code;
pub mod generator;

pub use code::{Code, ParseError as CodeParseError, LENGTH as CODE_LENGTH};
