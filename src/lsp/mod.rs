//! KPC Language Server Protocol Implementation
//!
//! Provides IDE support for KPC assembly editing including:
//! - Go to definition, references and highlights
//! - Auto-completion of mnemonics, registers and identifiers
//! - Hover documentation
//! - Signature help
//! - Semantic highlighting
//! - Document formatting

mod completion;
mod format;
mod hover;
mod registers;
mod semantic;
mod server;
mod signature;

pub use completion::{CompletionProvider, CompletionRequest};
pub use format::{format_document, format_text};
pub use hover::HoverProvider;
pub use registers::{find_register, Register, REGISTERS};
pub use semantic::{semantic_tokens, SemanticToken, TokenType, TOKEN_TYPES};
pub use server::*;
pub use signature::{find_signature, Signature, SignatureKind, TokenClass, SIGNATURES};
