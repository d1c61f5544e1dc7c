//! Source adapter layer
//!
//! An adapter connects to one external platform, fetches source-native
//! records per dimension and maps them onto the dimension schemas. New
//! platforms are added by declaring an `AdapterSpec`, not by writing code.

mod mapped;
mod mapping;
mod source;
mod spec;
mod template;
mod traits;
mod types;

pub use mapped::MappedAdapter;
pub use mapping::transform_records;
pub use source::{JsonDirSource, RecordSource, StaticSource};
pub use spec::{AdapterSpec, AuthSpec, DimensionMapping, ExpandSpec};
pub use traits::{AdapterError, AdapterResult, SourceAdapter};
pub use types::{Credentials, Filters, RawRecord, StandardRecord};
