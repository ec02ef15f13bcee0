pub mod filter;
pub mod memory_store;

#[cfg(feature = "sled")]
pub mod sled_store;

pub use memory_store::MemoryAdapter;

#[cfg(feature = "sled")]
pub use sled_store::SledAdapter;
