//! Reference search and document highlights
//!
//! A reference is only recognised in the form it must take at its site.
//! From another module a symbol is written `module.region.name`, from another
//! region of the same module `region.name`, and inside its own region `name`.
//! Symbols in the `@const` region are workspace-global and are written
//! `const.name` everywhere outside that region.

use super::cancel::CancellationToken;
use super::corpus::{scan_documents, Corpus};
use super::definition::{definition_document, resolve_definition};
use super::document::{Document, Location, Position, Range};
use super::marker::{self, CONST_NAME};
use super::segment::segment_at;
use regex::Regex;
use std::ops::ControlFlow;
use tracing::{debug, warn};

/// Where a definition lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionContext {
    pub module: Option<String>,
    pub region: Option<String>,
    pub identifier: String,
}

/// One reference, tagged with the range that was clicked to find it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceResult {
    pub location: Location,
    pub origin_selection_range: Range,
}

impl DefinitionContext {
    /// Context of a definition at `position` in `document`
    pub fn at(document: &Document, position: Position, identifier: &str) -> Self {
        Self {
            module: marker::module_name(document),
            region: marker::region_at(document, position.line as usize).map(|r| r.name),
            identifier: identifier.to_string(),
        }
    }

    /// The text a reference must have when written from a site in
    /// `site_module` / `site_region`
    pub fn qualified_name(&self, site_module: Option<&str>, site_region: Option<&str>) -> String {
        let identifier = &self.identifier;

        if self.region.as_deref() == Some(CONST_NAME) {
            return if site_region == Some(CONST_NAME) {
                identifier.clone()
            } else {
                format!("const.{}", identifier)
            };
        }

        if site_module != self.module.as_deref() {
            return match (&self.module, &self.region) {
                (Some(module), Some(region)) => format!("{}.{}.{}", module, region, identifier),
                _ => identifier.clone(),
            };
        }
        if site_region != self.region.as_deref() {
            return match &self.region {
                Some(region) => format!("{}.{}", region, identifier),
                None => identifier.clone(),
            };
        }
        identifier.clone()
    }
}

/// Word-bounded matcher for `name`, usable on one line
pub fn reference_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()
}

/// Columns where `pattern` matches and the match is not itself the tail of
/// a longer qualified name
pub fn match_columns(pattern: &Regex, line: &str) -> Vec<(usize, usize)> {
    pattern
        .find_iter(line)
        .filter(|m| !line[..m.start()].ends_with('.'))
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// All references to the definition of the identifier at `position`
///
/// On cancellation the references gathered from files already scanned are
/// returned.
pub fn find_references(
    corpus: &dyn Corpus,
    document: &Document,
    position: Position,
    cancel: &CancellationToken,
) -> Vec<ReferenceResult> {
    let Some(definition) = resolve_definition(corpus, document, position, cancel) else {
        return Vec::new();
    };
    let Some(def_document) = definition_document(corpus, document, &definition) else {
        return Vec::new();
    };

    let context = DefinitionContext::at(
        &def_document,
        definition.location.range.start,
        definition.clicked.identifier(),
    );
    debug!("Searching references for {:?}", context);

    let origin = definition.clicked.range;
    let mut references = Vec::new();
    scan_documents(corpus, cancel, |doc| {
        collect_references(doc, &context, origin, &mut references);
        ControlFlow::<()>::Continue(())
    });
    references
}

fn collect_references(
    document: &Document,
    context: &DefinitionContext,
    origin: Range,
    references: &mut Vec<ReferenceResult>,
) {
    let module = marker::module_name(document);
    let regions = marker::region_names_by_line(document);

    let mut cached: Option<(String, Regex)> = None;
    for (line, text) in document.lines().enumerate() {
        let name = context.qualified_name(module.as_deref(), regions[line].as_deref());
        let pattern = match &cached {
            Some((cached_name, pattern)) if *cached_name == name => pattern,
            _ => {
                let Some(pattern) = reference_pattern(&name) else {
                    warn!("Cannot build reference pattern for {}", name);
                    return;
                };
                &cached.insert((name, pattern)).1
            }
        };

        for (start, end) in match_columns(pattern, text) {
            references.push(ReferenceResult {
                location: Location {
                    uri: document.uri().to_string(),
                    range: Range::on_line(line, start, end),
                },
                origin_selection_range: origin,
            });
        }
    }
}

/// Ranges in the current region matching the identifier at `position` at the
/// qualification it was written with
pub fn document_highlights(document: &Document, position: Position) -> Vec<Range> {
    let Some(clicked) = segment_at(document, position) else {
        return Vec::new();
    };

    let mut parts: &[String] = &clicked.segments;
    if parts.len() > 1 && marker::module_name(document).as_deref() == Some(parts[0].as_str()) {
        parts = &parts[1..];
    }

    let target = if parts.len() == 1 || clicked.segment_index == 0 {
        parts[0].clone()
    } else {
        let upto = (clicked.segment_index + 1).min(parts.len());
        parts[..upto].join(".")
    };
    let Some(pattern) = reference_pattern(&target) else {
        return Vec::new();
    };

    let (start, end) = match marker::region_at(document, position.line as usize) {
        Some(region) => (region.start, region.end),
        None => (0, document.line_count().saturating_sub(1)),
    };

    (start..=end)
        .flat_map(|line| {
            pattern
                .find_iter(document.line_at(line))
                .map(move |m| Range::on_line(line, m.start(), m.end()))
                .collect::<Vec<_>>()
        })
        .collect()
}
