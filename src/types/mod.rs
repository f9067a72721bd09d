//! Shared data structures for water quality monitoring
//!
//! - `Sample`: one multi-parameter reading (any field may be absent)
//! - `Event`: a detected pollution event with severity
//! - `Band` / `ClassificationResult`: quality tier and weighted score

mod event;
mod quality;
mod sample;

pub use event::*;
pub use quality::*;
pub use sample::*;
