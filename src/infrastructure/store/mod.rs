//! Bounds store adapters

pub mod memory;
pub mod toml_file;

pub use memory::MemoryStore;
pub use toml_file::TomlFileStore;
