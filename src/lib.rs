mod batch_function;
mod cache;
mod config;
mod error;
mod loader;
mod loader_op;
mod loader_worker;
pub mod model;
pub mod registry;
mod store;
#[cfg(feature = "stats")]
mod worker_stats;

pub use batch_function::{BatchFunction, BatchResult, KeyResult};
pub use config::LoaderConfig;
pub use error::{LoadError, StoreError};
pub use loader::Loader;
pub use registry::{create_loaders, Loaders};
pub use store::{DataStore, MemoryStore};
