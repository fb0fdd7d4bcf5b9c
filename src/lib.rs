pub mod builder;
pub mod cache;
pub mod chains;
pub mod configs;
pub mod db;
pub mod engine;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod reader;
pub mod scheduler;
pub mod syncer;
