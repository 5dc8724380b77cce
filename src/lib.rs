pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod render;
pub mod resource;
pub mod storage;
pub mod vm;

pub use crate::bytecode::{BytecodeError, Instruction, Opcode};
pub use crate::compiler::{assemble, assemble_to_vec, CompilerError};
pub use crate::config::Config;
pub use crate::engine::{run_loop, Engine, EngineError};
pub use crate::resource::Resource;
pub use crate::storage::errors::{StorageError, StorageResult};
pub use crate::storage::traits::{StorageBackend, StorageExtensions};
pub use crate::vm::{State, VMError, VM};
