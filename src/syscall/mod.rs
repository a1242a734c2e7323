//! Raw OS primitives for mapping and unmapping anonymous memory.
//!
//! This module is the only place that talks to the kernel directly. Everything
//! above it (see [`crate::page_source`]) works in terms of the [`PageSource`]
//! trait, never these functions.
//!
//! [`PageSource`]: crate::page_source::PageSource

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
pub use windows::*;
