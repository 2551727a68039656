pub mod aggregator;
pub mod compare;
pub mod config;
pub mod error;
pub mod lookup;
pub mod output;
pub mod scoring;
pub mod server;
pub mod source;
pub mod store;
