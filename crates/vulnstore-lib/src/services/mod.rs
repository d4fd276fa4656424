// Services Module

pub mod ingest;
