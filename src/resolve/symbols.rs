//! Definition symbols
//!
//! A flat list of everything a document defines, each tagged with the
//! module, region and label it sits under. Completion and the `symbols`
//! command are built on this.

use super::document::{Document, Range};
use super::marker::CONST_NAME;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*@module\s+(\S+)\s*(.*)$").expect("module regex"));
static EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.exportregion\s+(\S+)\s*(.*)$").expect("export regex"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*(\S+)\s*(.*)$").expect("region regex"));
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:(\S+)\s*(.*)$").expect("label regex"));
static DEFREG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.defreg\s+(\S+)\s+(.+)$").expect("defreg regex"));
static DEFNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.defnum\s+(\S+)\s+(.+)$").expect("defnum regex"));
static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.def(\w+)\s+(\S+)\s+(.+)$").expect("def regex"));
static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.(\w+)\s+(\S+)\s+(.+)$").expect("command regex"));

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Region,
    Label,
    #[serde(rename = "defreg")]
    Register,
    Number,
    Def,
    Other,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Region => "region",
            SymbolKind::Label => "label",
            SymbolKind::Register => "defreg",
            SymbolKind::Number => "number",
            SymbolKind::Def => "def",
            SymbolKind::Other => "other",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a symbol was defined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// `<X>` of a `.def<X>` line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Name of a non-`def` dot command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Trailing text after the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

/// A symbol defined on one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSymbol {
    /// Unqualified name
    pub identifier: String,
    /// The trimmed definition line
    pub full_text: String,
    pub kind: SymbolKind,
    pub context: SymbolContext,
    /// The whole line
    pub range: Range,
    pub uri: String,
}

impl DefinitionSymbol {
    /// Whether this is a region made visible with `.exportregion`
    pub fn is_export(&self) -> bool {
        self.kind == SymbolKind::Region && self.full_text.starts_with(".exportregion")
    }
}

#[derive(Default)]
struct Scope {
    module: Option<String>,
    region: Option<String>,
    label: Option<String>,
}

impl Scope {
    fn context(&self) -> SymbolContext {
        SymbolContext {
            module: self.module.clone(),
            region: self.region.clone(),
            label: self.label.clone(),
            ..Default::default()
        }
    }
}

fn capture(caps: &regex::Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Parse every definition in `document`, in line order
pub fn definition_symbols(document: &Document) -> Vec<DefinitionSymbol> {
    let mut symbols = Vec::new();
    let mut scope = Scope::default();

    for (line, text) in document.lines().enumerate() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut push = |identifier: String, full_text: String, kind, context| {
            symbols.push(DefinitionSymbol {
                identifier,
                full_text,
                kind,
                context,
                range: Range::on_line(line, 0, text.len()),
                uri: document.uri().to_string(),
            });
        };

        if trimmed.starts_with("*@const") {
            scope.region = Some(CONST_NAME.to_string());
            scope.label = None;
            push(
                CONST_NAME.to_string(),
                "@const special region".to_string(),
                SymbolKind::Region,
                SymbolContext {
                    module: Some(CONST_NAME.to_string()),
                    region: Some(CONST_NAME.to_string()),
                    extra: Some(CONST_NAME.to_string()),
                    ..Default::default()
                },
            );
            continue;
        }

        if let Some(caps) = MODULE_RE.captures(trimmed) {
            let name = capture(&caps, 1);
            scope = Scope {
                module: Some(name.clone()),
                ..Default::default()
            };
            push(
                name.clone(),
                trimmed.to_string(),
                SymbolKind::Module,
                SymbolContext {
                    module: Some(name),
                    extra: Some(capture(&caps, 2)),
                    ..Default::default()
                },
            );
            continue;
        }

        let region = EXPORT_RE
            .captures(trimmed)
            .or_else(|| REGION_RE.captures(trimmed).filter(|c| !c[1].starts_with("@module")));
        if let Some(caps) = region {
            let name = capture(&caps, 1);
            scope.region = Some(name.clone());
            scope.label = None;
            let context = SymbolContext {
                extra: Some(capture(&caps, 2)),
                ..scope.context()
            };
            push(name, trimmed.to_string(), SymbolKind::Region, context);
            continue;
        }

        if let Some(caps) = LABEL_RE.captures(trimmed) {
            let name = capture(&caps, 1);
            scope.label = Some(name.clone());
            let context = SymbolContext {
                extra: Some(capture(&caps, 2)),
                ..scope.context()
            };
            push(name, trimmed.to_string(), SymbolKind::Label, context);
            continue;
        }

        if let Some(caps) = DEFREG_RE.captures(trimmed) {
            let context = SymbolContext {
                extra: Some(capture(&caps, 2)),
                ..scope.context()
            };
            push(capture(&caps, 1), trimmed.to_string(), SymbolKind::Register, context);
            continue;
        }

        if let Some(caps) = DEFNUM_RE.captures(trimmed) {
            let context = SymbolContext {
                extra: Some(capture(&caps, 2)),
                ..scope.context()
            };
            push(capture(&caps, 1), trimmed.to_string(), SymbolKind::Number, context);
            continue;
        }

        let generic = DEF_RE
            .captures(trimmed)
            .filter(|c| !c[1].starts_with("reg") && !c[1].starts_with("num"));
        if let Some(caps) = generic {
            let context = SymbolContext {
                subtype: Some(capture(&caps, 1)),
                extra: Some(capture(&caps, 3)),
                ..scope.context()
            };
            push(capture(&caps, 2), trimmed.to_string(), SymbolKind::Def, context);
            continue;
        }

        if let Some(caps) = COMMAND_RE.captures(trimmed) {
            let context = SymbolContext {
                command: Some(capture(&caps, 1)),
                extra: Some(capture(&caps, 3)),
                ..scope.context()
            };
            push(capture(&caps, 2), trimmed.to_string(), SymbolKind::Number, context);
        }
    }

    symbols
}
