pub mod analyzers;
pub mod collect;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fields;
pub mod handlers;
pub mod output;
pub mod parser;
pub mod plot;
pub mod providers;
pub mod rate_limit;
pub mod stats;
pub mod table;
