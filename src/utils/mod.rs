//! Utility functions shared across the custody subsystems.
//!
//! - **fs**: atomic temp-then-rename writes for evidence and custody files
//! - **hash**: SHA-256 digests over persisted bytes

pub mod fs;
pub mod hash;

pub use fs::{atomic_write, atomic_write_json};
pub use hash::{sha256_bytes, sha256_file};
