pub mod api;
pub mod config;
pub mod postgres_storage;
pub mod service;
pub mod sqlite_storage;
pub mod storage;
pub mod supervisor;
pub mod telemetry;

