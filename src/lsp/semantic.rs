//! Semantic highlighting of identifier usages
//!
//! Every identifier segment on a non-definition line is resolved, and the
//! line it resolves to decides its token type.

use super::server::SemanticTokens;
use crate::resolve::cancel::CancellationToken;
use crate::resolve::corpus::Corpus;
use crate::resolve::definition::{definition_document, resolve_definition};
use crate::resolve::document::{Document, Position};
use crate::resolve::segment::IDENTIFIER_RE;
use tracing::debug;

/// Token type legend, indexed by [`TokenType`]
pub const TOKEN_TYPES: [&str; 6] = ["function", "operator", "keyword", "typeParameter", "number", "string"];

/// Semantic token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TokenType {
    /// Labels
    Function = 0,
    /// Modules
    Operator = 1,
    /// Regions
    Keyword = 2,
    /// `.defreg` aliases
    TypeParameter = 3,
    /// `.defnum` and other `.def*` aliases
    Number = 4,
    String = 5,
}

/// A classified identifier segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    pub line: u32,
    pub start: u32,
    pub length: u32,
    pub token_type: TokenType,
}

fn is_definition_line(text: &str) -> bool {
    text.trim_start().starts_with([':', '.', '*'])
}

/// Token type for a usage resolving to `definition_line`
pub fn classify_definition(definition_line: &str) -> TokenType {
    let trimmed = definition_line.trim_start();
    if trimmed.starts_with(':') {
        TokenType::Function
    } else if trimmed.starts_with('*') {
        if definition_line.contains("@module") {
            TokenType::Operator
        } else {
            TokenType::Keyword
        }
    } else if trimmed.starts_with(".exportregion") {
        TokenType::Keyword
    } else if trimmed.starts_with(".defreg") {
        TokenType::TypeParameter
    } else if trimmed.starts_with(".def") {
        TokenType::Number
    } else {
        TokenType::String
    }
}

/// Classify every resolvable identifier segment in `document`
///
/// Stops early, returning what it has, once `cancel` fires.
pub fn semantic_tokens(
    corpus: &dyn Corpus,
    document: &Document,
    cancel: &CancellationToken,
) -> Vec<SemanticToken> {
    let mut tokens = Vec::new();

    for (line, text) in document.lines().enumerate() {
        if cancel.is_cancelled() {
            debug!("Semantic tokens cancelled at line {}", line);
            break;
        }
        if is_definition_line(text) {
            continue;
        }

        for identifier in IDENTIFIER_RE.find_iter(text) {
            let mut start = identifier.start();
            for segment in identifier.as_str().split('.') {
                let position = Position::new(line, start + segment.len());
                let token_type = resolve_definition(corpus, document, position, cancel).and_then(|def| {
                    let def_document = definition_document(corpus, document, &def)?;
                    let def_line = def_document.line_at(def.location.range.start.line as usize);
                    Some(classify_definition(def_line))
                });
                if let Some(token_type) = token_type {
                    tokens.push(SemanticToken {
                        line: line as u32,
                        start: start as u32,
                        length: segment.len() as u32,
                        token_type,
                    });
                }
                start += segment.len() + 1;
            }
        }
    }

    tokens
}

/// Relative `(deltaLine, deltaStart, length, type, modifiers)` encoding
pub fn encode(tokens: &[SemanticToken]) -> SemanticTokens {
    let mut data = Vec::with_capacity(tokens.len() * 5);
    let (mut prev_line, mut prev_start) = (0, 0);

    for token in tokens {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.start - prev_start
        } else {
            token.start
        };
        data.extend([delta_line, delta_start, token.length, token.token_type as u32, 0]);
        prev_line = token.line;
        prev_start = token.start;
    }

    SemanticTokens { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::corpus::MemoryCorpus;

    #[test]
    fn test_classify_definition() {
        assert_eq!(classify_definition("  :loop"), TokenType::Function);
        assert_eq!(classify_definition("*@module Math"), TokenType::Operator);
        assert_eq!(classify_definition("*add"), TokenType::Keyword);
        assert_eq!(classify_definition("*@const"), TokenType::Keyword);
        assert_eq!(classify_definition(".exportregion add"), TokenType::Keyword);
        assert_eq!(classify_definition(".defreg acc $t1"), TokenType::TypeParameter);
        assert_eq!(classify_definition(".defnum one 1"), TokenType::Number);
        assert_eq!(classify_definition(".defcolor red 1 2 3"), TokenType::Number);
        assert_eq!(classify_definition(".asciiz hello \"hi\""), TokenType::String);
    }

    #[test]
    fn test_semantic_tokens() {
        let corpus = MemoryCorpus::new()
            .with("file:///math.kpc", "*@module Math\n.exportregion add\n*add\n  .defnum one 1\n")
            .with(
                "file:///main.kpc",
                "*@module Main\n*start\n  :loop\n  .defreg acc $t1\n  addi acc Math.add.one\n  jl loop\n",
            );
        let document = corpus.open("file:///main.kpc").unwrap();
        let tokens = semantic_tokens(&corpus, &document, &CancellationToken::new());

        let summary: Vec<(u32, u32, u32, TokenType)> = tokens
            .iter()
            .map(|t| (t.line, t.start, t.length, t.token_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (4, 7, 3, TokenType::TypeParameter),
                (4, 11, 4, TokenType::Operator),
                (4, 16, 3, TokenType::Keyword),
                (4, 20, 3, TokenType::Number),
                (5, 5, 4, TokenType::Function),
            ]
        );
    }

    #[test]
    fn test_encode_relative() {
        let tokens = [
            SemanticToken { line: 1, start: 4, length: 3, token_type: TokenType::Number },
            SemanticToken { line: 1, start: 10, length: 2, token_type: TokenType::Function },
            SemanticToken { line: 3, start: 2, length: 5, token_type: TokenType::Keyword },
        ];
        assert_eq!(
            encode(&tokens).data,
            vec![1, 4, 3, 4, 0, 0, 6, 2, 0, 0, 2, 2, 5, 2, 0]
        );
    }
}
