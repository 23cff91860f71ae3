//! Schema-preserving Avro emitter and reader for Iceberg manifest and
//! manifest-list files.

pub mod manifest;
pub mod manifest_list;
mod ocf;
mod schema;

pub use manifest::{read_manifest, write_manifest};
pub use manifest_list::{read_manifest_list, write_manifest_list};
pub use ocf::read_schema_json;
pub use schema::{MANIFEST_ENTRY_SCHEMA_JSON, MANIFEST_LIST_SCHEMA_JSON};
