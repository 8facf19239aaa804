//! tgfp-seed
//!
//! Creates the administrative principal and the empty `players` collection a
//! fresh tgfp MongoDB instance needs.

pub mod seed;

pub use seed::*;
