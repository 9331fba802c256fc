pub mod document;
pub mod tag;

pub use document::*;
pub use tag::*;
