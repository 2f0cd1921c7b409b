//! Utility modules
//!
//! Contains string helpers shared by the engines and configuration.

pub mod string;

pub use string::{is_sql_identifier, single_line, truncate_str, truncate_with_suffix};
