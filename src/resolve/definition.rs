//! Definition lookup for dotted identifiers
//!
//! The number of segments picks the search scope:
//!
//! - `name` - the current region of the current document
//! - `region.name` - a named region of the current document
//! - `const.name` - the `@const` region, wherever it lives in the workspace
//! - `module.region.name` - an exported region of a module anywhere in the workspace
//!
//! Every miss is silent. When several documents or lines could answer, the
//! first one in corpus enumeration order wins.

use super::cancel::CancellationToken;
use super::corpus::{scan_documents, Corpus};
use super::document::{Document, Location, Position};
use super::marker::{self, CONST_NAME};
use super::segment::{segment_at, ClickedSegment};
use std::ops::ControlFlow;
use tracing::debug;

/// What a resolved location points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionTarget {
    /// A `*@module` line
    Module,
    /// A region (or `*@const`) marker line
    Region,
    /// A label or `.def*` line
    Symbol,
}

/// A resolved definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionResult {
    pub location: Location,
    pub target: DefinitionTarget,
    /// The identifier that was resolved
    pub clicked: ClickedSegment,
}

/// Resolve the identifier at `position` to its definition
pub fn resolve_definition(
    corpus: &dyn Corpus,
    document: &Document,
    position: Position,
    cancel: &CancellationToken,
) -> Option<DefinitionResult> {
    let clicked = segment_at(document, position)?;
    debug!(
        "Resolving {} (segment {} of {:?})",
        clicked.full_identifier, clicked.segment_index, clicked.segments
    );

    let found = match clicked.segments.len() {
        1 => resolve_local(document, position, &clicked),
        2 => resolve_const(corpus, &clicked, cancel)
            .or_else(|| resolve_region_qualified(document, &clicked)),
        3 => resolve_module_qualified(corpus, &clicked, cancel),
        _ => None,
    };

    let (location, target) = found?;
    debug!("Resolved {} to {}:{}", clicked.full_identifier, location.uri, location.range.start.line);
    Some(DefinitionResult {
        location,
        target,
        clicked,
    })
}

type Found = (Location, DefinitionTarget);

fn symbol(uri: &str, position: Position) -> Found {
    (Location::new(uri, position), DefinitionTarget::Symbol)
}

fn region_start(uri: &str, region: &marker::Region) -> Found {
    (
        Location::new(uri, Position::new(region.start, 0)),
        DefinitionTarget::Region,
    )
}

fn resolve_local(document: &Document, position: Position, clicked: &ClickedSegment) -> Option<Found> {
    let region = marker::region_at(document, position.line as usize)?;
    let found = marker::find_region_definition(document, &region.name, &clicked.segment)?;
    Some(symbol(document.uri(), found))
}

fn resolve_const(
    corpus: &dyn Corpus,
    clicked: &ClickedSegment,
    cancel: &CancellationToken,
) -> Option<Found> {
    if clicked.segments[0] != "const" {
        return None;
    }

    scan_documents(corpus, cancel, |doc| {
        if !marker::contains_const_module(doc) {
            return ControlFlow::Continue(());
        }
        let Some(region) = marker::find_region(doc, CONST_NAME) else {
            return ControlFlow::Continue(());
        };
        let found = match clicked.segment_index {
            0 => Some(region_start(doc.uri(), &region)),
            _ => marker::find_const_definition(doc, &region, &clicked.segments[1])
                .map(|position| symbol(doc.uri(), position)),
        };
        match found {
            Some(found) => ControlFlow::Break(found),
            None => ControlFlow::Continue(()),
        }
    })
}

fn resolve_region_qualified(document: &Document, clicked: &ClickedSegment) -> Option<Found> {
    let region = &clicked.segments[0];
    match clicked.segment_index {
        0 => marker::find_region(document, region).map(|r| region_start(document.uri(), &r)),
        _ => marker::find_region_definition(document, region, &clicked.segments[1])
            .map(|position| symbol(document.uri(), position)),
    }
}

fn resolve_module_qualified(
    corpus: &dyn Corpus,
    clicked: &ClickedSegment,
    cancel: &CancellationToken,
) -> Option<Found> {
    let (module, region_name) = (&clicked.segments[0], &clicked.segments[1]);

    scan_documents(corpus, cancel, |doc| {
        let Some(decl) = marker::module_of(doc).filter(|m| &m.name == module) else {
            return ControlFlow::Continue(());
        };
        if !marker::is_exported(doc, region_name) {
            debug!("{} does not export {} from {}", doc.uri(), region_name, module);
            return ControlFlow::Continue(());
        }

        let found = match clicked.segment_index {
            0 => Some((Location::new(doc.uri(), decl.position), DefinitionTarget::Module)),
            1 => marker::find_region(doc, region_name).map(|r| region_start(doc.uri(), &r)),
            _ => marker::find_region_definition(doc, region_name, &clicked.segments[2])
                .map(|position| symbol(doc.uri(), position)),
        };
        match found {
            Some(found) => ControlFlow::Break(found),
            None => ControlFlow::Continue(()),
        }
    })
}

/// Load the document a definition lives in, reusing `current` when it matches
pub fn definition_document(
    corpus: &dyn Corpus,
    current: &Document,
    definition: &DefinitionResult,
) -> Option<Document> {
    if definition.location.uri == current.uri() {
        return Some(current.clone());
    }
    match corpus.open(&definition.location.uri) {
        Ok(document) => Some(document),
        Err(e) => {
            tracing::warn!("Failed to open {}: {}", definition.location.uri, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::resolve::corpus::MemoryCorpus;
    use std::cell::Cell;

    const MATH: &str = "file:///math.kpc";
    const MAIN: &str = "file:///main.kpc";

    fn resolve(corpus: &MemoryCorpus, uri: &str, line: usize, column: usize) -> Option<DefinitionResult> {
        let document = corpus.open(uri).unwrap();
        resolve_definition(corpus, &document, Position::new(line, column), &CancellationToken::new())
    }

    fn workspace(math: &str) -> MemoryCorpus {
        MemoryCorpus::new().with(MATH, math).with(
            MAIN,
            "*@module Main\n*start\n  jl Math.add.one\n  jl helper\n:helper\n",
        )
    }

    #[test]
    fn test_unqualified_in_current_region() {
        let corpus = MemoryCorpus::new().with(
            MATH,
            "*@module Math\n*add\n  :start\n  .defnum one 1\n  addi $t1 one\n",
        );

        let result = resolve(&corpus, MATH, 3, 11).unwrap();
        assert_eq!(result.location, Location::new(MATH, Position::new(3, 10)));
        assert_eq!(result.target, DefinitionTarget::Symbol);

        let from_use = resolve(&corpus, MATH, 4, 12).unwrap();
        assert_eq!(from_use.location.range.start.line, 3);

        // idempotent
        assert_eq!(resolve(&corpus, MATH, 4, 12), Some(from_use));
    }

    #[test]
    fn test_unqualified_outside_region_misses() {
        let corpus = MemoryCorpus::new().with(MAIN, "jl top\n:top\n");
        assert!(resolve(&corpus, MAIN, 0, 4).is_none());
    }

    #[test]
    fn test_module_qualified_requires_export() {
        let exported = workspace("*@module Math\n*add\n  :start\n  .defnum one 1\n.exportregion add\n");
        let result = resolve(&exported, MAIN, 2, 14).unwrap();
        assert_eq!(result.location, Location::new(MATH, Position::new(3, 10)));

        let hidden = workspace("*@module Math\n*add\n  :start\n  .defnum one 1\n");
        assert!(resolve(&hidden, MAIN, 2, 14).is_none());
    }

    #[test]
    fn test_module_qualified_segments() {
        let corpus = workspace("*@module Math\n.exportregion add\n*add\n  .defnum one 1\n");

        let module = resolve(&corpus, MAIN, 2, 5).unwrap();
        assert_eq!(module.target, DefinitionTarget::Module);
        assert_eq!(module.location, Location::new(MATH, Position::new(0, 9)));

        // the export line opens the region
        let region = resolve(&corpus, MAIN, 2, 10).unwrap();
        assert_eq!(region.target, DefinitionTarget::Region);
        assert_eq!(region.location, Location::new(MATH, Position::new(1, 0)));

        let symbol = resolve(&corpus, MAIN, 2, 14).unwrap();
        assert_eq!(symbol.location, Location::new(MATH, Position::new(3, 10)));
    }

    #[test]
    fn test_export_only_region() {
        let corpus = workspace("*@module Math\n.exportregion add\n  .defnum one 1\n  addi $t1 one");

        let local = resolve(&corpus, MATH, 3, 12).unwrap();
        assert_eq!(local.location, Location::new(MATH, Position::new(2, 10)));

        let qualified = resolve(&corpus, MAIN, 2, 14).unwrap();
        assert_eq!(qualified.location, Location::new(MATH, Position::new(2, 10)));
    }

    #[test]
    fn test_exports_grouped_above_regions() {
        let corpus = workspace(
            "*@module Math\n.exportregion add\n.exportregion sub\n*add\n  .defnum one 1\n*sub\n  .defnum two 2\n",
        );
        let result = resolve(&corpus, MAIN, 2, 14).unwrap();
        assert_eq!(result.location, Location::new(MATH, Position::new(4, 10)));
    }

    #[test]
    fn test_region_qualified_in_same_document() {
        let corpus = MemoryCorpus::new().with(
            MAIN,
            "*@module Main\n*util\n:helper\n*start\n  jl util.helper\n",
        );

        let region = resolve(&corpus, MAIN, 4, 6).unwrap();
        assert_eq!(region.location, Location::new(MAIN, Position::new(1, 0)));

        let label = resolve(&corpus, MAIN, 4, 12).unwrap();
        assert_eq!(label.location, Location::new(MAIN, Position::new(2, 1)));
    }

    #[test]
    fn test_const_lookup_across_workspace() {
        let corpus = MemoryCorpus::new()
            .with(MAIN, "*@module Main\n*start\n  getl $t1 const.greeting\n")
            .with("file:///consts.kpc", "*@const\n.asciiz greeting \"hi\"\n");

        let region = resolve(&corpus, MAIN, 2, 12).unwrap();
        assert_eq!(region.location, Location::new("file:///consts.kpc", Position::new(0, 0)));

        let value = resolve(&corpus, MAIN, 2, 20).unwrap();
        assert_eq!(value.location, Location::new("file:///consts.kpc", Position::new(1, 8)));
    }

    #[test]
    fn test_first_module_in_enumeration_order_wins() {
        let corpus = MemoryCorpus::new()
            .with("file:///a.kpc", "*@module Dup\n.exportregion r\n*r\n:x\n")
            .with("file:///b.kpc", "*@module Dup\n.exportregion r\n*r\n:x\n")
            .with(MAIN, "*@module Main\n*m\n  jl Dup.r.x\n");

        let result = resolve(&corpus, MAIN, 2, 12).unwrap();
        assert_eq!(result.location.uri, "file:///a.kpc");
    }

    #[test]
    fn test_cancelled_scan_returns_none() {
        let corpus = workspace("*@module Math\n.exportregion add\n*add\n  .defnum one 1\n");
        let document = corpus.open(MAIN).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(resolve_definition(&corpus, &document, Position::new(2, 14), &cancel).is_none());
        // local lookups never touch the corpus
        assert!(resolve_definition(&corpus, &document, Position::new(3, 6), &cancel).is_some());
    }

    /// Cancels the request while opening the second file
    struct CancelOnSecondOpen {
        inner: MemoryCorpus,
        cancel: CancellationToken,
        opened: Cell<usize>,
    }

    impl Corpus for CancelOnSecondOpen {
        fn find_files(&self, glob: &str) -> Result<Vec<String>> {
            self.inner.find_files(glob)
        }

        fn open(&self, uri: &str) -> Result<Document> {
            self.opened.set(self.opened.get() + 1);
            if self.opened.get() == 2 {
                self.cancel.cancel();
            }
            self.inner.open(uri)
        }
    }

    #[test]
    fn test_cancelled_while_opening_module() {
        let corpus = CancelOnSecondOpen {
            inner: MemoryCorpus::new()
                .with("file:///other.kpc", "*@module Other\n")
                .with(MATH, "*@module Math\n.exportregion add\n*add\n  .defnum one 1\n")
                .with(MAIN, "*@module Main\n*start\n  jl Math.add.one\n"),
            cancel: CancellationToken::new(),
            opened: Cell::new(0),
        };
        let main = corpus.inner.open(MAIN).unwrap();

        assert!(resolve_definition(&corpus, &main, Position::new(2, 14), &corpus.cancel).is_none());
        assert_eq!(corpus.opened.get(), 2);
    }

    #[test]
    fn test_not_an_identifier() {
        let corpus = workspace("*@module Math\n");
        assert!(resolve(&corpus, MAIN, 2, 0).is_none());
    }
}
