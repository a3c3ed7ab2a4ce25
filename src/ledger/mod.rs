pub mod audit;
pub mod blobs;
pub mod cache;
pub mod config;
pub mod engine;
pub mod event;
pub mod geo;
pub mod identity;
pub mod merge;
pub mod paths;
pub mod payload;
pub mod record;
pub mod report;
pub mod sanitize;
pub mod store;
pub mod warn;
