//! Shared utilities: error types, terminal printing and string helpers.

pub mod errors;
pub mod printer;
pub mod string_utils;
