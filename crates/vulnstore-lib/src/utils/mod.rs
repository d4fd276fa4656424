// Utility functions module

pub mod config;
pub mod database;
pub mod lenient;
pub mod schema;
pub mod timestamp;
