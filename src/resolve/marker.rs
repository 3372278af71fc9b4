//! Marker scanning
//!
//! KPC structure is line-oriented. Each line holds at most one marker, and
//! leading whitespace is ignored:
//!
//! | Marker | Line |
//! |---|---|
//! | module | `*@module <name>` |
//! | const region | `*@const` |
//! | region | `*<name>` |
//! | export flag | `.exportregion <name>` |
//! | label | `:<name>` |
//! | typed definition | `.def<subtype> <name> <value...>` |
//! | command | `.<cmd> <name> <value...>` |
//!
//! Region, const and export lines all open a region. A region runs from
//! its marker line to the line before the next marker opening a different
//! region (or a module marker), or to the end of the document. Adjacent
//! markers naming the same region, such as `.exportregion add` directly
//! above `*add`, form one region.

use super::document::{Document, Position};
use regex::Regex;
use std::sync::LazyLock;

/// Name of the const pseudo-module and its region
pub const CONST_NAME: &str = "@const";

static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*@module\s+(\S+)\s*$").expect("module regex"));
static CONST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*@const\s*$").expect("const regex"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*(\S+)\s*$").expect("region regex"));
static EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\.exportregion\s+(\S+)\s*$").expect("export regex"));
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:(\S+)\s*$").expect("label regex"));
static TYPED_DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\.def(\w+)\s+(\S+)\s+(.+)$").expect("definition regex"));
static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\.(\w+)\s+(\S+)\s+(.+)$").expect("command regex"));

/// What a `.def*` or command line defines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    /// `.defreg`
    Register,
    /// `.defnum`
    Number,
    /// Any other `.def<subtype>`
    Def(String),
    /// A non-`def` dot command such as `.asciiz`
    Command(String),
}

/// Marker kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    Module { name: String },
    Const,
    Region { name: String },
    Export { region: String },
    Label { name: String },
    Definition {
        kind: DefinitionKind,
        name: String,
        value: String,
    },
}

/// A marker found on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column of the marker's name
    pub column: usize,
}

impl Marker {
    /// Classify a single line
    pub fn parse_line(line: usize, text: &str) -> Option<Self> {
        let marker = |kind, column| Some(Self { kind, line, column });

        if let Some(caps) = MODULE_RE.captures(text) {
            let name = caps.get(1)?;
            return marker(
                MarkerKind::Module {
                    name: name.as_str().to_string(),
                },
                name.start(),
            );
        }
        if CONST_RE.is_match(text) {
            let column = text.find(CONST_NAME).unwrap_or(0);
            return marker(MarkerKind::Const, column);
        }
        if let Some(caps) = REGION_RE.captures(text) {
            let name = caps.get(1)?;
            // a bare "*@module" is a malformed module line, not a region
            if !name.as_str().starts_with("@module") {
                return marker(
                    MarkerKind::Region {
                        name: name.as_str().to_string(),
                    },
                    name.start(),
                );
            }
            return None;
        }
        if let Some(caps) = EXPORT_RE.captures(text) {
            let name = caps.get(1)?;
            return marker(
                MarkerKind::Export {
                    region: name.as_str().to_string(),
                },
                name.start(),
            );
        }
        if let Some(caps) = LABEL_RE.captures(text) {
            let name = caps.get(1)?;
            return marker(
                MarkerKind::Label {
                    name: name.as_str().to_string(),
                },
                name.start(),
            );
        }
        if let Some(caps) = TYPED_DEF_RE.captures(text) {
            let subtype = caps.get(1)?.as_str();
            let name = caps.get(2)?;
            let kind = match subtype {
                "reg" => DefinitionKind::Register,
                "num" => DefinitionKind::Number,
                other => DefinitionKind::Def(other.to_string()),
            };
            return marker(
                MarkerKind::Definition {
                    kind,
                    name: name.as_str().to_string(),
                    value: caps.get(3)?.as_str().trim_end().to_string(),
                },
                name.start(),
            );
        }
        if let Some(caps) = COMMAND_RE.captures(text) {
            let name = caps.get(2)?;
            return marker(
                MarkerKind::Definition {
                    kind: DefinitionKind::Command(caps.get(1)?.as_str().to_string()),
                    name: name.as_str().to_string(),
                    value: caps.get(3)?.as_str().trim_end().to_string(),
                },
                name.start(),
            );
        }
        None
    }

    /// Whether this marker ends the region above it
    pub fn is_region_boundary(&self) -> bool {
        matches!(
            self.kind,
            MarkerKind::Module { .. }
                | MarkerKind::Const
                | MarkerKind::Region { .. }
                | MarkerKind::Export { .. }
        )
    }

    /// Region name if this marker opens a region
    pub fn region_name(&self) -> Option<&str> {
        match &self.kind {
            MarkerKind::Region { name } => Some(name),
            MarkerKind::Export { region } => Some(region),
            MarkerKind::Const => Some(CONST_NAME),
            _ => None,
        }
    }

    /// Name defined by a label or `.def*` line
    pub fn definition_name(&self) -> Option<&str> {
        match &self.kind {
            MarkerKind::Label { name } => Some(name),
            MarkerKind::Definition {
                kind: DefinitionKind::Register | DefinitionKind::Number | DefinitionKind::Def(_),
                name,
                ..
            } => Some(name),
            _ => None,
        }
    }

    /// Name defined by a label or any dot command
    pub fn const_definition_name(&self) -> Option<&str> {
        match &self.kind {
            MarkerKind::Label { name } | MarkerKind::Definition { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A region's line span, both ends inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

/// A module declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: String,
    pub position: Position,
}

/// All markers in a document, in line order
pub fn scan(document: &Document) -> Vec<Marker> {
    document
        .lines()
        .enumerate()
        .filter_map(|(line, text)| Marker::parse_line(line, text))
        .collect()
}

/// For a boundary line, the region it opens (`None` for a module marker)
fn boundary_at(document: &Document, line: usize) -> Option<Option<String>> {
    let marker = Marker::parse_line(line, document.line_at(line))?;
    marker
        .is_region_boundary()
        .then(|| marker.region_name().map(str::to_string))
}

/// Last line of the region `name` opened at `start`
fn region_end(document: &Document, start: usize, name: &str) -> usize {
    (start + 1..document.line_count())
        .find(|&line| boundary_at(document, line).is_some_and(|next| next.as_deref() != Some(name)))
        .map(|line| line - 1)
        .unwrap_or_else(|| document.line_count().saturating_sub(1))
}

/// Nearest boundary at or above `line`
fn boundary_above(document: &Document, line: usize) -> Option<(usize, Option<String>)> {
    (0..=line)
        .rev()
        .find_map(|l| boundary_at(document, l).map(|name| (l, name)))
}

/// The region enclosing `line`
///
/// Walks up to the nearest boundary. A module marker met first means the
/// line sits outside any region.
pub fn region_at(document: &Document, line: usize) -> Option<Region> {
    if document.line_count() == 0 {
        return None;
    }
    let line = line.min(document.line_count() - 1);
    let (mut start, name) = boundary_above(document, line)?;
    let name = name?;
    while let Some((above, other)) = start.checked_sub(1).and_then(|l| boundary_above(document, l)) {
        if other.as_deref() != Some(name.as_str()) {
            break;
        }
        start = above;
    }
    Some(Region {
        end: region_end(document, start, &name),
        name,
        start,
    })
}

/// First region named `name`
pub fn find_region(document: &Document, name: &str) -> Option<Region> {
    region_spans(document, name).into_iter().next()
}

/// Every span of the region named `name`, in document order
///
/// A region split by other markers, like a group of `.exportregion` lines
/// above the region bodies, has more than one span.
pub fn region_spans(document: &Document, name: &str) -> Vec<Region> {
    let mut spans = Vec::new();
    let mut line = 0;
    while line < document.line_count() {
        if boundary_at(document, line).flatten().as_deref() == Some(name) {
            let end = region_end(document, line, name);
            spans.push(Region {
                name: name.to_string(),
                start: line,
                end,
            });
            line = end + 1;
        } else {
            line += 1;
        }
    }
    spans
}

/// Region name for every line (`None` outside regions), in one pass
pub fn region_names_by_line(document: &Document) -> Vec<Option<String>> {
    let mut current: Option<String> = None;
    document
        .lines()
        .enumerate()
        .map(|(line, text)| {
            if let Some(marker) = Marker::parse_line(line, text) {
                if marker.is_region_boundary() {
                    current = marker.region_name().map(str::to_string);
                }
            }
            current.clone()
        })
        .collect()
}

/// The document's first module declaration
pub fn module_of(document: &Document) -> Option<ModuleDecl> {
    document.lines().enumerate().find_map(|(line, text)| {
        match Marker::parse_line(line, text)? {
            Marker {
                kind: MarkerKind::Module { name },
                column,
                ..
            } => Some(ModuleDecl {
                name,
                position: Position::new(line, column),
            }),
            _ => None,
        }
    })
}

/// Name of the document's module
pub fn module_name(document: &Document) -> Option<String> {
    module_of(document).map(|m| m.name)
}

/// Whether `.exportregion <region>` appears anywhere in the document
pub fn is_exported(document: &Document, region: &str) -> bool {
    document.lines().any(|text| {
        EXPORT_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .is_some_and(|name| name.as_str() == region)
    })
}

/// Whether the document holds the const pseudo-module
pub fn contains_const_module(document: &Document) -> bool {
    document.lines().any(|text| CONST_RE.is_match(text))
}

/// Names of every region marker or exported region, deduplicated
pub fn region_names(document: &Document) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for marker in scan(document) {
        let name = match &marker.kind {
            MarkerKind::Region { name } => name.as_str(),
            MarkerKind::Export { region } => region.as_str(),
            _ => continue,
        };
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn find_in_region(
    document: &Document,
    region: &Region,
    identifier: &str,
    name_of: impl Fn(&Marker) -> Option<&str>,
) -> Option<Position> {
    (region.start..=region.end.min(document.line_count().saturating_sub(1))).find_map(|line| {
        let marker = Marker::parse_line(line, document.line_at(line))?;
        (name_of(&marker)? == identifier).then(|| Position::new(line, marker.column))
    })
}

/// First label or `.def*` line in `region` defining `identifier`
pub fn find_definition(document: &Document, region: &Region, identifier: &str) -> Option<Position> {
    find_in_region(document, region, identifier, Marker::definition_name)
}

/// First label or `.def*` line defining `identifier` in any span of the
/// region `name`
pub fn find_region_definition(document: &Document, name: &str, identifier: &str) -> Option<Position> {
    region_spans(document, name)
        .iter()
        .find_map(|region| find_definition(document, region, identifier))
}

/// Like [`find_definition`], but any dot command defines a name
pub fn find_const_definition(
    document: &Document,
    region: &Region,
    identifier: &str,
) -> Option<Position> {
    find_in_region(document, region, identifier, Marker::const_definition_name)
}
