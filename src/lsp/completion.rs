//! Completion Provider for KPC LSP

use super::registers::register_completions;
use super::server::{CompletionItem, TextEdit};
use super::signature::{SignatureContext, SignatureKind, TokenClass, SIGNATURES};
use crate::resolve::cancel::CancellationToken;
use crate::resolve::corpus::{scan_documents, Corpus};
use crate::resolve::document::{Document, Position, Range};
use crate::resolve::marker::{self, CONST_NAME};
use crate::resolve::symbols::{definition_symbols, DefinitionSymbol, SymbolKind};
use regex::Regex;
use std::ops::ControlFlow;
use std::sync::LazyLock;

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@?[:$A-Za-z][A-Za-z0-9_$.]*").expect("prefix regex"));
static INSTRUCTION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?[A-Za-z]").expect("instruction line regex"));
static MNEMONIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+\s+").expect("mnemonic regex"));

/// Symbol kind an operand of `class` can be filled with
pub fn symbol_kind_for(class: TokenClass) -> SymbolKind {
    match class {
        TokenClass::Identifier | TokenClass::Label => SymbolKind::Label,
        TokenClass::Register => SymbolKind::Register,
        TokenClass::Number => SymbolKind::Number,
        TokenClass::Region => SymbolKind::Region,
        _ => SymbolKind::Other,
    }
}

/// An identifier completion request
///
/// The signature context is passed in rather than read from shared state,
/// so a request only ever sees the operand it was raised for.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest {
    pub position: Position,
    pub signature: Option<SignatureContext>,
}

impl CompletionRequest {
    /// Request at `position`, with the signature context derived from the line
    pub fn at(document: &Document, position: Position) -> Self {
        let line = document.line_at(position.line as usize);
        Self {
            position,
            signature: SignatureContext::at(line, position.character as usize),
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.to_lowercase().starts_with(&prefix.to_lowercase())
}

fn eq_ignore_case(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| a.to_lowercase() == b.to_lowercase())
}

fn variable_item(symbol: &DefinitionSymbol, documentation: String, edit_range: Option<Range>) -> CompletionItem {
    CompletionItem {
        label: symbol.identifier.clone(),
        kind: Some(CompletionItem::VARIABLE),
        detail: Some(symbol.kind.to_string()),
        documentation: Some(documentation),
        sort_text: Some(format!("1_{}", symbol.identifier)),
        text_edit: edit_range.map(|range| TextEdit {
            range,
            new_text: symbol.identifier.clone(),
        }),
        ..Default::default()
    }
}

/// Completion provider for KPC
pub struct CompletionProvider {}

impl CompletionProvider {
    /// Create a new completion provider
    pub fn new() -> Self {
        Self {}
    }

    /// Get completions at the given position
    pub fn get_completions(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        position: Position,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let line = document.line_at(position.line as usize);
        let mut items = self.mnemonic_completions(line);

        if let Some(registers) = register_completions(document, position) {
            items.extend(registers);
            return items;
        }

        let request = CompletionRequest::at(document, position);
        if let Some(identifiers) = self.identifier_completions(corpus, document, &request, cancel) {
            items.extend(identifiers);
        }
        items
    }

    /// Instruction mnemonics at the start of a line, commands after a leading `.`
    pub fn mnemonic_completions(&self, line: &str) -> Vec<CompletionItem> {
        let trimmed = line.trim_start();
        if trimmed.starts_with('.') {
            if trimmed.contains(char::is_whitespace) {
                return Vec::new();
            }
            return self.signature_items(SignatureKind::Command);
        }
        if !trimmed.is_empty() && MNEMONIC_RE.is_match(line) {
            return Vec::new();
        }
        let mut items = self.signature_items(SignatureKind::Instruction);
        items.extend(self.signature_items(SignatureKind::Pseudoinstruction));
        items
    }

    fn signature_items(&self, kind: SignatureKind) -> Vec<CompletionItem> {
        SIGNATURES
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| {
                let (item_kind, detail) = match kind {
                    SignatureKind::Instruction => (CompletionItem::METHOD, s.summary().map(str::to_string)),
                    SignatureKind::Pseudoinstruction => (
                        CompletionItem::METHOD,
                        Some(format!("{} (pseudoinstruction)", s.name.to_lowercase())),
                    ),
                    SignatureKind::Command => (CompletionItem::KEYWORD, s.summary().map(str::to_string)),
                };
                CompletionItem {
                    label: s.name.to_lowercase(),
                    kind: Some(item_kind),
                    detail,
                    ..Default::default()
                }
            })
            .collect()
    }

    /// Definitions, regions and modules that fit the operand being written
    ///
    /// Returns `None` when the request has no operand to fill or the cursor
    /// is not on an instruction operand.
    pub fn identifier_completions(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Option<Vec<CompletionItem>> {
        let expected = symbol_kind_for(request.signature?.expected_class()?);
        let position = request.position;

        let line = document.line_at(position.line as usize);
        let trimmed = line.trim();
        if !INSTRUCTION_LINE_RE.is_match(trimmed) {
            return None;
        }
        let mnemonic = trimmed.split_whitespace().next()?;
        let operand_start = line.find(mnemonic)? + mnemonic.len();
        if position.character as usize <= operand_start {
            return None;
        }

        let (mut prefix, mut word_range) = match document.word_range_at(position, &PREFIX_RE) {
            Some(range) => (document.text_in(range), Some(range)),
            None => ("", None),
        };
        if let Some(stripped) = prefix.strip_prefix(':') {
            prefix = stripped;
            word_range = word_range.map(|r| {
                Range::new(Position::new(r.start.line as usize, r.start.character as usize + 1), r.end)
            });
        }
        // replaces whatever follows the last dot of the prefix
        let tail_range = word_range.zip(prefix.rfind('.')).map(|(range, dot)| {
            Range::new(
                Position::new(range.start.line as usize, range.start.character as usize + dot + 1),
                range.end,
            )
        });

        let mut parts: Vec<&str> = prefix.split('.').collect();
        if parts[0].eq_ignore_ascii_case(CONST_NAME) {
            parts.insert(0, CONST_NAME);
        }

        let items = match parts.as_slice() {
            [name] => self.complete_name(corpus, document, position, name, expected, cancel),
            [first, second] => self.complete_qualified(
                corpus,
                document,
                first,
                second,
                expected,
                tail_range,
                cancel,
            ),
            [module, region, name] => {
                self.complete_module_qualified(corpus, module, region, name, expected, tail_range, cancel)
            }
            _ => Vec::new(),
        };
        Some(items)
    }

    fn complete_name(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        position: Position,
        name: &str,
        expected: SymbolKind,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let current = marker::region_at(document, position.line as usize).map(|r| r.name);
        let mut items = Vec::new();

        if let Some(current) = &current {
            items.extend(
                definition_symbols(document)
                    .iter()
                    .filter(|s| eq_ignore_case(s.context.region.as_deref(), current))
                    .filter(|s| starts_with_ignore_case(&s.identifier, name))
                    .filter(|s| s.kind == expected)
                    .map(|s| {
                        variable_item(s, format!("Defined in region {}", current), None)
                    }),
            );
        }

        items.extend(
            marker::region_names(document)
                .into_iter()
                .filter(|r| !eq_ignore_case(current.as_deref(), r))
                .filter(|r| starts_with_ignore_case(r, name))
                .map(|r| CompletionItem {
                    label: r.clone(),
                    kind: Some(CompletionItem::FOLDER),
                    detail: Some("Region (other)".to_string()),
                    sort_text: Some(format!("2_{}", r)),
                    ..Default::default()
                }),
        );

        items.extend(
            workspace_modules(corpus, cancel)
                .into_iter()
                .filter(|m| starts_with_ignore_case(m, name))
                .map(|m| CompletionItem {
                    label: m.clone(),
                    kind: Some(CompletionItem::MODULE),
                    detail: Some("Module".to_string()),
                    sort_text: Some(format!("3_{}", m)),
                    ..Default::default()
                }),
        );
        items
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_qualified(
        &self,
        corpus: &dyn Corpus,
        document: &Document,
        first: &str,
        second: &str,
        expected: SymbolKind,
        tail_range: Option<Range>,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let local_region = marker::region_names(document)
            .iter()
            .any(|r| r.to_lowercase() == first.to_lowercase());
        if local_region {
            return definition_symbols(document)
                .iter()
                .filter(|s| eq_ignore_case(s.context.region.as_deref(), first))
                .filter(|s| starts_with_ignore_case(&s.identifier, second))
                .filter(|s| s.kind == expected)
                .map(|s| {
                    let region = s.context.region.as_deref().unwrap_or(first);
                    variable_item(s, format!("Defined in region {}", region), None)
                })
                .collect();
        }

        let is_module = workspace_modules(corpus, cancel)
            .iter()
            .any(|m| m.to_lowercase() == first.to_lowercase());
        if !is_module {
            return Vec::new();
        }

        let module_symbols = module_symbols(corpus, first, cancel);
        if second.trim().is_empty() {
            let mut exported: Vec<&str> = Vec::new();
            for symbol in module_symbols.iter().filter(|s| s.is_export()) {
                if !exported.contains(&symbol.identifier.as_str()) {
                    exported.push(&symbol.identifier);
                }
            }
            return exported
                .into_iter()
                .map(|region| CompletionItem {
                    label: region.to_string(),
                    kind: Some(CompletionItem::FOLDER),
                    detail: Some(format!("Exported region from module {}", first)),
                    sort_text: Some(format!("1_{}", region)),
                    text_edit: tail_range.map(|range| TextEdit {
                        range,
                        new_text: region.to_string(),
                    }),
                    ..Default::default()
                })
                .collect();
        }

        module_symbols
            .iter()
            .filter(|s| eq_ignore_case(s.context.region.as_deref(), second))
            .filter(|s| s.kind == expected)
            .map(|s| {
                let region = s.context.region.as_deref().unwrap_or(second);
                variable_item(
                    s,
                    format!("Defined in region {} of module {}", region, first),
                    None,
                )
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_module_qualified(
        &self,
        corpus: &dyn Corpus,
        module: &str,
        region: &str,
        name: &str,
        expected: SymbolKind,
        tail_range: Option<Range>,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let is_const = module == CONST_NAME;
        let mut symbols = Vec::new();
        scan_documents(corpus, cancel, |doc| {
            let matches = (is_const && marker::contains_const_module(doc))
                || eq_ignore_case(marker::module_name(doc).as_deref(), module);
            if matches {
                symbols.extend(definition_symbols(doc).into_iter().filter(|s| {
                    eq_ignore_case(s.context.region.as_deref(), region)
                        && starts_with_ignore_case(&s.identifier, name)
                        && s.kind != SymbolKind::Region
                }));
            }
            ControlFlow::<()>::Continue(())
        });

        symbols
            .iter()
            .filter(|s| s.kind == expected)
            .map(|s| {
                variable_item(
                    s,
                    format!("Defined in region {} of module {}", region, module),
                    tail_range,
                )
            })
            .collect()
    }
}

impl Default for CompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Every module name declared in the workspace, `@const` first
pub fn workspace_modules(corpus: &dyn Corpus, cancel: &CancellationToken) -> Vec<String> {
    let mut modules = vec![CONST_NAME.to_string()];
    scan_documents(corpus, cancel, |doc| {
        if let Some(name) = marker::module_name(doc) {
            if !modules.contains(&name) {
                modules.push(name);
            }
        }
        ControlFlow::<()>::Continue(())
    });
    modules
}

/// Definition symbols of every document declaring `module`
fn module_symbols(corpus: &dyn Corpus, module: &str, cancel: &CancellationToken) -> Vec<DefinitionSymbol> {
    let mut symbols = Vec::new();
    scan_documents(corpus, cancel, |doc| {
        if eq_ignore_case(marker::module_name(doc).as_deref(), module) {
            symbols.extend(definition_symbols(doc));
        }
        ControlFlow::<()>::Continue(())
    });
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::corpus::MemoryCorpus;

    const MATH: &str = "file:///math.kpc";
    const MAIN: &str = "file:///main.kpc";
    const CONSTS: &str = "file:///consts.kpc";

    fn corpus(main: &str) -> MemoryCorpus {
        MemoryCorpus::new()
            .with(
                MATH,
                "*@module Math\n.exportregion mul\n*mul\n  :loop\n  .defnum two 2\n  .defreg acc $t1\n*div\n  .defnum three 3\n",
            )
            .with(CONSTS, "*@const\n.defnum max 255\n.asciiz hello \"hi\"\n")
            .with(MAIN, main)
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    fn complete(corpus: &MemoryCorpus, line: usize, character: usize) -> Option<Vec<CompletionItem>> {
        let provider = CompletionProvider::new();
        let document = corpus.open(MAIN).unwrap();
        let request = CompletionRequest::at(&document, Position::new(line, character));
        provider.identifier_completions(corpus, &document, &request, &CancellationToken::new())
    }

    #[test]
    fn test_token_class_mapping() {
        assert_eq!(symbol_kind_for(TokenClass::Identifier), SymbolKind::Label);
        assert_eq!(symbol_kind_for(TokenClass::Register), SymbolKind::Register);
        assert_eq!(symbol_kind_for(TokenClass::Number), SymbolKind::Number);
        assert_eq!(symbol_kind_for(TokenClass::String), SymbolKind::Other);
    }

    #[test]
    fn test_no_signature_no_completions() {
        let c = corpus("*@module Main\n*start\n  bogus \n");
        assert!(complete(&c, 2, 8).is_none());
        // past the last operand
        let c = corpus("*@module Main\n*start\n  jr $t1 \n");
        assert!(complete(&c, 2, 9).is_none());
    }

    #[test]
    fn test_single_part_locals_regions_modules() {
        let c = corpus("*@module Main\n*start\n  :top\n  :again\n  jl \n*other\n");
        let items = complete(&c, 4, 5).unwrap();
        assert_eq!(labels(&items), vec!["top", "again", "other", "@const", "Math", "Main"]);
        assert_eq!(items[0].kind, Some(CompletionItem::VARIABLE));
        assert_eq!(items[0].detail.as_deref(), Some("label"));
        assert_eq!(items[2].kind, Some(CompletionItem::FOLDER));
        assert_eq!(items[3].kind, Some(CompletionItem::MODULE));
    }

    #[test]
    fn test_single_part_prefix_filter_is_case_insensitive() {
        let c = corpus("*@module Main\n*start\n  :top\n  jl MA\n");
        let items = complete(&c, 3, 7).unwrap();
        assert_eq!(labels(&items), vec!["Math", "Main"]);
    }

    #[test]
    fn test_expected_kind_filters_locals() {
        let c = corpus("*@module Main\n*start\n  :top\n  .defnum n 1\n  addi $t1 \n");
        let items = complete(&c, 4, 11).unwrap();
        assert_eq!(labels(&items)[0], "n");
        assert!(!labels(&items).contains(&"top"));
    }

    #[test]
    fn test_module_dot_lists_exported_regions() {
        let c = corpus("*@module Main\n*start\n  jl Math.\n");
        let items = complete(&c, 2, 10).unwrap();
        assert_eq!(labels(&items), vec!["mul"]);
        let edit = items[0].text_edit.as_ref().unwrap();
        assert_eq!(edit.range, Range::on_line(2, 10, 10));
    }

    #[test]
    fn test_module_region_definitions() {
        let c = corpus("*@module Main\n*start\n  jl Math.mul\n");
        let items = complete(&c, 2, 13).unwrap();
        assert_eq!(labels(&items), vec!["loop"]);
        assert_eq!(
            items[0].documentation.as_deref(),
            Some("Defined in region mul of module Math")
        );
    }

    #[test]
    fn test_local_region_qualified() {
        let c = corpus("*@module Main\n*util\n  :helper\n*start\n  jl util.h\n");
        let items = complete(&c, 4, 11).unwrap();
        assert_eq!(labels(&items), vec!["helper"]);
    }

    #[test]
    fn test_three_parts_with_replace_range() {
        let c = corpus("*@module Main\n*start\n  addi $t1 Math.mul.t\n");
        let items = complete(&c, 2, 21).unwrap();
        assert_eq!(labels(&items), vec!["two"]);
        let edit = items[0].text_edit.as_ref().unwrap();
        assert_eq!(edit.range, Range::on_line(2, 20, 21));
        assert_eq!(edit.new_text, "two");
    }

    #[test]
    fn test_const_prefix_is_expanded() {
        let c = corpus("*@module Main\n*start\n  addi $t1 @const.m\n");
        let items = complete(&c, 2, 19).unwrap();
        assert_eq!(labels(&items), vec!["max"]);
    }

    #[test]
    fn test_cursor_in_mnemonic() {
        let c = corpus("*@module Main\n*start\n  jl top\n");
        assert!(complete(&c, 2, 3).is_none());
    }

    #[test]
    fn test_mnemonic_completions() {
        let provider = CompletionProvider::new();
        let items = provider.mnemonic_completions("  ");
        assert_eq!(items.len(), 59 + 42);
        assert_eq!(items[0].label, "nop");
        assert_eq!(items[0].detail.as_deref(), Some("No operation"));

        let commands = provider.mnemonic_completions("  .def");
        assert_eq!(commands.len(), 12);
        assert!(commands.iter().all(|i| i.kind == Some(CompletionItem::KEYWORD)));

        assert!(provider.mnemonic_completions("  addi $t1").is_empty());
        assert!(provider.mnemonic_completions(".defnum x").is_empty());
    }

    #[test]
    fn test_get_completions_prefers_registers() {
        let c = corpus("*@module Main\n*start\n  addi $t\n");
        let document = c.open(MAIN).unwrap();
        let items = CompletionProvider::new().get_completions(
            &c,
            &document,
            Position::new(2, 9),
            &CancellationToken::new(),
        );
        assert_eq!(labels(&items), vec!["$t4", "$t1", "$t2", "$t3"]);
    }
}
