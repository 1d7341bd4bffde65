//! Search index access and the snapshot writer.

mod elastic;
mod schema;
mod writer;

pub use elastic::{ElasticIndex, SearchIndex};
pub use schema::{Field, FieldType, SCHEMA, mapping_json};
pub use writer::IndexWriter;

/// Log target of every index request, raised to `trace` to log each call
pub const INDEX_LOG_TARGET: &str = elastic::LOG_TARGET;
