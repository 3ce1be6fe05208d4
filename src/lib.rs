// Library for the resmon binary and its tests

pub mod config;
pub mod delta;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod process_tree;
pub mod sampler;
pub mod scheduler;
pub mod sink;
pub mod sysinfo_repo;
pub mod version;
