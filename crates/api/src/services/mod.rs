//! Orchestration services.
//!
//! The HTTP layer stays thin; everything that touches the filesystem,
//! the queue, or more than one table lives here.

pub mod assets;
pub mod experiments;
pub mod jobs;
pub mod projects;
