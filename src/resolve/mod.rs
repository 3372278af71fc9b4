//! KPC symbol resolution
//!
//! Resolves dotted identifiers in KPC assembly to their definitions and
//! finds every reference to a definition across a workspace:
//! - Marker scanning (modules, regions, exports, labels, `.def*` lines)
//! - Identifier segmentation
//! - Scope-aware definition lookup
//! - Qualification-aware reference search

pub mod cancel;
pub mod corpus;
pub mod definition;
pub mod document;
pub mod marker;
pub mod references;
pub mod segment;
pub mod symbols;

pub use cancel::CancellationToken;
pub use corpus::{Corpus, FsCorpus, MemoryCorpus, OverlayCorpus};
pub use definition::{resolve_definition, DefinitionResult, DefinitionTarget};
pub use document::{Document, Location, Position, Range};
pub use references::{document_highlights, find_references, ReferenceResult};
pub use segment::{segment_at, ClickedSegment};
pub use symbols::{definition_symbols, DefinitionSymbol, SymbolKind};
