// vulnstore shared library
// Scan models, repositories, ingestion services, and utilities

pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
