//! minisql - A minimal SQL engine in Rust
//!
//! This crate provides a small relational database with:
//! - SQL parsing (lexer, parser, AST)
//! - Logical planning and execution (joins, grouping, aggregates)
//! - A referentially-constrained catalog persisted as JSON files
//! - A playground facade: execute / history / reset / tables

pub mod config;
pub mod db;
pub mod error;
pub mod sql;
pub mod storage;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
