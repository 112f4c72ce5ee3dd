//! Document-chunk index
//!
//! - `model`: chunk records and the validated, immutable index snapshot
//! - `source`: backing stores the index bytes are fetched from
//! - `store`: the lazily loaded, process-lifetime index provider

mod model;
mod source;
mod store;

pub use model::{Chunk, Index};
pub use source::{IndexSource, LocalFileIndexSource, S3IndexSource, StaticIndexSource};
pub use store::IndexProvider;
