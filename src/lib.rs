pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
mod id;
pub mod index;
pub mod logging;
pub mod partition;

pub use catalog::{SegmentCatalog, SegmentDescriptor};
pub use config::PartitionConfig;
pub use error::{PartitionError, Result};
pub use fetch::{FetchHandles, FetchRequest, FetchedMessage};
pub use index::{Direction, IndexEntry, SortedIndex};
pub use partition::Partition;
