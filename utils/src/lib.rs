//! Shared infrastructure utilities for trawl.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename), used for edited
//!   source files and for installing the provisioned search binary.

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_new_with_options,
    atomic_write_with_options,
};
