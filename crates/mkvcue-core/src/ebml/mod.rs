//! EBML decoding primitives.
//!
//! - [`vint`]: var-int codec for ids and lengths
//! - [`element`]: the parsed element tree and lazy byte spans
//! - [`block`]: block frame headers
//! - [`parser`]: recursive descent driven by a schema node

pub mod block;
pub mod element;
pub mod parser;
pub mod vint;

pub use block::Block;
pub use element::{ByteSpan, Element, Master, Value};
pub use parser::{ElementParser, ParseFilter};
