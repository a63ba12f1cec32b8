pub mod cache;
pub mod local;
pub mod memory;

pub use cache::TableCache;
pub use local::LocalDataSource;
pub use memory::MemoryDataSource;
