//! KPC - Symbol resolution and editor tooling for KPC assembly
//!
//! KPC sources are line-oriented assembly files grouped into modules and
//! regions by marker lines. This crate provides:
//!
//! - A resolution engine mapping identifiers to definitions and back to
//!   their references across a workspace
//! - A Language Server speaking LSP over stdio
//! - A command line front-end over the same engine

pub mod config;
pub mod error;
pub mod lsp;
pub mod resolve;

pub use error::{KpcError, Result};
