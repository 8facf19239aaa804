//! Seed targets: a MongoDB session and an in-memory stand-in.

pub mod memory;
pub mod mongo;

pub use memory::{MemoryServer, MemoryTarget};
pub use mongo::MongoTarget;
