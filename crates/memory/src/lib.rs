//! Memory store implementations for dekomposit.

pub mod in_memory;

pub use in_memory::InMemoryStore;
