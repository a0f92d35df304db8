//! Source extractor adapters

mod indeed;
pub(crate) mod sections;
mod wuzzuf;

pub use indeed::IndeedSource;
pub use wuzzuf::WuzzufSource;
