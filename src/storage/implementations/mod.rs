pub mod file_storage;
pub mod in_memory;
