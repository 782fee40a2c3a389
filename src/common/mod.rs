// Common constants and helpers shared across the crate
pub mod constants;
pub mod utils;
