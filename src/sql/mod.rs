//! SQL processing module
//!
//! This module provides:
//! - `parser`: SQL lexer and parser
//! - `types`: SQL data types and runtime values
//! - `schema`: Table and column schema definitions
//! - `plan`: Logical plan generation
//! - `executor`: Query and mutation execution

pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
