//! Bootstrap seeding: the fixed plan, the runner that applies it, and the
//! checks that confirm a server was seeded.

pub mod plan;
pub mod runner;
pub mod verify;

pub use plan::SeedPlan;
pub use runner::{run, SeedFailure, SeedReport, SeedStep};
pub use verify::{verify, verify_login, Mismatch};
