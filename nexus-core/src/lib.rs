//! nexus-core - Core library for Nexus
//!
//! Synchronous building blocks shared by the SDK and the CLI:
//!
//! - **types**: activity records, compiled blocks, super blocks
//! - **index**: flat L2 vector index with aligned metadata
//! - **storage**: JSON list stores and the data directory layout
//! - **conversation**: per-session turn history
//! - **trace**: execution trace of orchestration runs

pub mod conversation;
pub mod error;
pub mod index;
pub mod storage;
pub mod trace;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use conversation::{ConversationStore, ConversationTurn, SessionSummary};
pub use error::{Error, Result};
pub use index::{IndexPaths, VectorIndex};
pub use storage::DataPaths;
pub use types::{ActivityRecord, CompiledBlock, IndexedMemory, MemoryLevel, SuperBlock};
