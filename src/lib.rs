// Re-export modules for benchmarking and testing
pub mod config;
pub mod database;
pub mod error;
pub mod facts;
pub mod output;
pub mod parallel_processor;
pub mod parser;
pub mod processor;
pub mod reconciler;
pub mod signatures;
pub mod tree;
pub mod types;
