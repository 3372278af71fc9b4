//! Hover Provider for KPC LSP

use super::registers::register_hover;
use super::server::{Hover, MarkupContent};
use super::signature::signature_hover;
use crate::resolve::cancel::CancellationToken;
use crate::resolve::corpus::Corpus;
use crate::resolve::definition::{definition_document, resolve_definition};
use crate::resolve::document::{Document, Position};

/// Hover provider for KPC
pub struct HoverProvider {}

impl HoverProvider {
    /// Create a new hover provider
    pub fn new() -> Self {
        Self {}
    }

    /// Get hover information at the given position
    ///
    /// Registers win over identifiers, identifiers over mnemonics.
    pub fn get_hover(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        position: Position,
        cancel: &CancellationToken,
    ) -> Option<Hover> {
        register_hover(document, position)
            .or_else(|| self.identifier_hover(corpus, document, position, cancel))
            .or_else(|| signature_hover(document, position))
    }

    /// The definition line of the identifier under the cursor
    pub fn identifier_hover(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        position: Position,
        cancel: &CancellationToken,
    ) -> Option<Hover> {
        let definition = resolve_definition(corpus, document, position, cancel)?;
        let def_document = definition_document(corpus, document, &definition)?;
        let line = def_document.line_at(definition.location.range.start.line as usize);

        Some(Hover {
            contents: MarkupContent::markdown(format!("\t{}", line.trim())),
            range: Some(definition.clicked.range),
        })
    }
}

impl Default for HoverProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::corpus::MemoryCorpus;
    use crate::resolve::document::Range;

    const MAIN: &str = "file:///main.kpc";

    fn hover_at(corpus: &MemoryCorpus, line: usize, column: usize) -> Option<Hover> {
        let document = corpus.open(MAIN).unwrap();
        HoverProvider::new().get_hover(
            corpus,
            &document,
            Position::new(line, column),
            &CancellationToken::new(),
        )
    }

    #[test]
    fn test_hover_on_identifier() {
        let corpus = MemoryCorpus::new()
            .with("file:///math.kpc", "*@module Math\n.exportregion add\n*add\n    .defnum one 1   \n")
            .with(MAIN, "*@module Main\n*start\n  addi $t1 Math.add.one\n");

        let hover = hover_at(&corpus, 2, 20).unwrap();
        assert_eq!(hover.contents.value, "\t.defnum one 1");
        assert_eq!(hover.range, Some(Range::on_line(2, 11, 23)));
    }

    #[test]
    fn test_hover_on_register() {
        let corpus = MemoryCorpus::new().with(MAIN, "*start\n  addi $t1 one\n");
        let hover = hover_at(&corpus, 1, 8).unwrap();
        assert!(hover.contents.value.contains("Temporary 1"));
    }

    #[test]
    fn test_hover_on_mnemonic() {
        let corpus = MemoryCorpus::new().with(MAIN, "*start\n  addi $t1 one\n");
        let hover = hover_at(&corpus, 1, 3).unwrap();
        assert_eq!(hover.contents.value, "### addi `reg1` `num` - Add immediate");
    }

    #[test]
    fn test_no_hover() {
        let corpus = MemoryCorpus::new().with(MAIN, "*start\n  addi $t1 nothing\n");
        assert!(hover_at(&corpus, 1, 13).is_none());
        assert!(hover_at(&corpus, 1, 1).is_none());
    }
}
