//! Typed argument structs for every external program stackctl drives.

pub mod app;
pub mod compose;
pub mod git;
pub mod postgres;
pub mod volume;
