pub mod adapters;
pub mod core;
pub mod global_constants;
