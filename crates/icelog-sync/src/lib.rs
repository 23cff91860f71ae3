//! Change detection, watermark persistence, the append writer, the upsert
//! importer, and the coordinator that sequences them into one sync cycle.

pub mod append;
pub mod change_detector;
pub mod coordinator;
pub mod importer;
pub mod watermark_store;

pub use append::append;
pub use change_detector::{build_query, ExtractionQuery};
pub use coordinator::{CancellationToken, Coordinator, SyncOptions, SyncResult};
pub use importer::Importer;
pub use watermark_store::WatermarkStore;
