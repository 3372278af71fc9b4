//! KPC LSP Server Implementation

use super::completion::CompletionProvider;
use super::format::format_document;
use super::hover::HoverProvider;
use super::semantic::{encode, semantic_tokens, TOKEN_TYPES};
use super::signature::signature_help;
use crate::config::KpcConfig;
use crate::error::{KpcError, Result};
use crate::resolve::cancel::CancellationToken;
use crate::resolve::corpus::{uri_to_path, Corpus, FsCorpus, OverlayCorpus};
use crate::resolve::definition::resolve_definition;
use crate::resolve::document::Document;
use crate::resolve::references::{document_highlights, find_references};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub use crate::resolve::document::{Location, Position, Range};

/// LSP message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum LspMessage {
    #[serde(rename = "initialize")]
    Initialize { params: InitializeParams },

    #[serde(rename = "initialized")]
    Initialized,

    #[serde(rename = "shutdown")]
    Shutdown,

    #[serde(rename = "exit")]
    Exit,

    #[serde(rename = "textDocument/didOpen")]
    DidOpen { params: DidOpenParams },

    #[serde(rename = "textDocument/didChange")]
    DidChange { params: DidChangeParams },

    #[serde(rename = "textDocument/didClose")]
    DidClose { params: DidCloseParams },

    #[serde(rename = "textDocument/definition")]
    Definition { params: TextDocumentPositionParams },

    #[serde(rename = "textDocument/references")]
    References { params: ReferenceParams },

    #[serde(rename = "textDocument/documentHighlight")]
    DocumentHighlight { params: TextDocumentPositionParams },

    #[serde(rename = "textDocument/hover")]
    Hover { params: TextDocumentPositionParams },

    #[serde(rename = "textDocument/completion")]
    Completion { params: TextDocumentPositionParams },

    #[serde(rename = "textDocument/signatureHelp")]
    SignatureHelp { params: TextDocumentPositionParams },

    #[serde(rename = "textDocument/semanticTokens/full")]
    SemanticTokensFull { params: SemanticTokensParams },

    #[serde(rename = "textDocument/formatting")]
    Formatting { params: FormattingParams },

    /// Any method this server does not handle
    #[serde(other)]
    Unknown,
}

/// Initialize request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub process_id: Option<i64>,
    pub root_uri: Option<String>,
}

/// Document open params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

/// Document change params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

/// Document close params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseParams {
    pub text_document: TextDocumentIdentifier,
}

/// A position in a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentPositionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

/// References params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(default)]
    pub context: Option<ReferenceContext>,
}

/// References context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceContext {
    pub include_declaration: bool,
}

/// Semantic tokens params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTokensParams {
    pub text_document: TextDocumentIdentifier,
}

/// Formatting params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingParams {
    pub text_document: TextDocumentIdentifier,
    pub options: FormattingOptions,
}

/// Formatting options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingOptions {
    pub tab_size: u32,
    pub insert_spaces: bool,
}

/// Text document item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i64,
    pub text: String,
}

/// Text document identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

/// Versioned text document identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: i64,
}

/// Text document change event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    pub text: String,
}

/// Server capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub text_document_sync: TextDocumentSyncOptions,
    pub completion_provider: Option<CompletionOptions>,
    pub hover_provider: Option<bool>,
    pub definition_provider: Option<bool>,
    pub references_provider: Option<bool>,
    pub document_highlight_provider: Option<bool>,
    pub signature_help_provider: Option<SignatureHelpOptions>,
    pub semantic_tokens_provider: Option<SemanticTokensOptions>,
    pub document_formatting_provider: Option<bool>,
}

/// Text document sync options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentSyncOptions {
    pub open_close: bool,
    pub change: u8, // 1 = Full, 2 = Incremental
}

/// Completion options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub trigger_characters: Vec<String>,
    pub resolve_provider: bool,
}

/// Signature help options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelpOptions {
    pub trigger_characters: Vec<String>,
}

/// Semantic tokens options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTokensOptions {
    pub legend: SemanticTokensLegend,
    pub full: bool,
}

/// Semantic tokens legend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTokensLegend {
    pub token_types: Vec<String>,
    pub token_modifiers: Vec<String>,
}

/// Initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    pub capabilities: ServerCapabilities,
}

/// Completion item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    pub kind: Option<u8>,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_edit: Option<TextEdit>,
}

impl CompletionItem {
    pub const METHOD: u8 = 2;
    pub const VARIABLE: u8 = 6;
    pub const MODULE: u8 = 9;
    pub const KEYWORD: u8 = 14;
    pub const FOLDER: u8 = 19;
}

/// Hover result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hover {
    pub contents: MarkupContent,
    pub range: Option<Range>,
}

/// Markup content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupContent {
    pub kind: String,
    pub value: String,
}

impl MarkupContent {
    pub fn markdown(value: impl Into<String>) -> Self {
        Self {
            kind: "markdown".to_string(),
            value: value.into(),
        }
    }
}

/// Signature help
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelp {
    pub signatures: Vec<SignatureInformation>,
    pub active_signature: u32,
    pub active_parameter: u32,
}

/// One signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInformation {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<MarkupContent>,
    pub parameters: Vec<ParameterInformation>,
}

/// One signature parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterInformation {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<MarkupContent>,
}

/// Document highlight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHighlight {
    pub range: Range,
    pub kind: Option<u8>, // 1 = Text
}

/// Semantic tokens, relative-encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticTokens {
    pub data: Vec<u32>,
}

/// Text edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// KPC Language Server
///
/// Open buffers shadow files on disk; everything else is read from the
/// workspace folder given at initialize.
pub struct KpcLanguageServer {
    documents: Arc<RwLock<HashMap<String, String>>>,
    config: KpcConfig,
    explicit_config: bool,
    workspace: Option<FsCorpus>,
    completion_provider: CompletionProvider,
    hover_provider: HoverProvider,
    shutdown_requested: bool,
}

impl KpcLanguageServer {
    /// Create a new language server
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            config: KpcConfig::default(),
            explicit_config: false,
            workspace: None,
            completion_provider: CompletionProvider::new(),
            hover_provider: HoverProvider::new(),
            shutdown_requested: false,
        }
    }

    /// Create a server that uses `config` instead of the workspace's own
    pub fn with_config(config: KpcConfig) -> Self {
        Self {
            config,
            explicit_config: true,
            ..Self::new()
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Handle initialize request
    pub fn initialize(&mut self, params: &InitializeParams) -> InitializeResult {
        if let Some(root) = params.root_uri.as_deref().and_then(uri_to_path) {
            if !self.explicit_config {
                self.config = match KpcConfig::load(None, &root) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Ignoring workspace config: {}", e);
                        KpcConfig::default()
                    }
                };
            }
            info!("Workspace root: {}", root.display());
            self.workspace = Some(FsCorpus::with_config(root, &self.config));
        }

        InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: TextDocumentSyncOptions {
                    open_close: true,
                    change: 1, // Full sync
                },
                completion_provider: Some(CompletionOptions {
                    trigger_characters: vec![".".to_string(), "$".to_string(), " ".to_string()],
                    resolve_provider: false,
                }),
                hover_provider: Some(true),
                definition_provider: Some(true),
                references_provider: Some(true),
                document_highlight_provider: Some(true),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: vec![" ".to_string(), "\t".to_string()],
                }),
                semantic_tokens_provider: Some(SemanticTokensOptions {
                    legend: SemanticTokensLegend {
                        token_types: TOKEN_TYPES.iter().map(|t| t.to_string()).collect(),
                        token_modifiers: Vec::new(),
                    },
                    full: true,
                }),
                document_formatting_provider: Some(true),
            },
        }
    }

    /// Handle document open
    pub fn did_open(&self, params: &DidOpenParams) {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(params.text_document.uri.clone(), params.text_document.text.clone());
    }

    /// Handle document change
    pub fn did_change(&self, params: &DidChangeParams) {
        if let Some(change) = params.content_changes.last() {
            let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
            docs.insert(params.text_document.uri.clone(), change.text.clone());
        }
    }

    /// Handle document close
    pub fn did_close(&self, params: &DidCloseParams) {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.remove(&params.text_document.uri);
    }

    /// Run `f` against a snapshot of the open buffers layered over the workspace
    fn with_document<T>(&self, uri: &str, f: impl FnOnce(&dyn Corpus, &Document) -> T) -> Option<T> {
        let buffers = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let corpus = OverlayCorpus::new(self.workspace.as_ref().map(|w| w as &dyn Corpus), &buffers);
        match corpus.open(uri) {
            Ok(document) => Some(f(&corpus, &document)),
            Err(e) => {
                warn!("Cannot open {}: {}", uri, e);
                None
            }
        }
    }

    /// Handle definition request
    pub fn definition(
        &self,
        params: &TextDocumentPositionParams,
        cancel: &CancellationToken,
    ) -> Option<Location> {
        self.with_document(&params.text_document.uri, |corpus, document| {
            resolve_definition(corpus, document, params.position, cancel).map(|d| d.location)
        })
        .flatten()
    }

    /// Handle references request
    pub fn references(&self, params: &ReferenceParams, cancel: &CancellationToken) -> Vec<Location> {
        self.with_document(&params.text_document.uri, |corpus, document| {
            find_references(corpus, document, params.position, cancel)
                .into_iter()
                .map(|r| r.location)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Handle document highlight request
    pub fn document_highlight(&self, params: &TextDocumentPositionParams) -> Vec<DocumentHighlight> {
        self.with_document(&params.text_document.uri, |_, document| {
            document_highlights(document, params.position)
                .into_iter()
                .map(|range| DocumentHighlight {
                    range,
                    kind: Some(1),
                })
                .collect()
        })
        .unwrap_or_default()
    }

    /// Handle hover request
    pub fn hover(&self, params: &TextDocumentPositionParams, cancel: &CancellationToken) -> Option<Hover> {
        self.with_document(&params.text_document.uri, |corpus, document| {
            self.hover_provider.get_hover(corpus, document, params.position, cancel)
        })
        .flatten()
    }

    /// Handle completion request
    pub fn completion(
        &self,
        params: &TextDocumentPositionParams,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        self.with_document(&params.text_document.uri, |corpus, document| {
            self.completion_provider.get_completions(corpus, document, params.position, cancel)
        })
        .unwrap_or_default()
    }

    /// Handle signature help request
    pub fn signature_help(&self, params: &TextDocumentPositionParams) -> Option<SignatureHelp> {
        self.with_document(&params.text_document.uri, |_, document| {
            signature_help(document, params.position)
        })
        .flatten()
    }

    /// Handle full-document semantic tokens request
    pub fn semantic_tokens_full(
        &self,
        params: &SemanticTokensParams,
        cancel: &CancellationToken,
    ) -> SemanticTokens {
        self.with_document(&params.text_document.uri, |corpus, document| {
            encode(&semantic_tokens(corpus, document, cancel))
        })
        .unwrap_or(SemanticTokens { data: Vec::new() })
    }

    /// Handle formatting request
    pub fn formatting(&self, params: &FormattingParams) -> Vec<TextEdit> {
        self.with_document(&params.text_document.uri, |_, document| {
            format_document(document, &params.options)
        })
        .unwrap_or_default()
    }

    /// Dispatch one message, returning the result to send for a request
    ///
    /// A request whose token was cancelled while it ran yields
    /// [`KpcError::Cancelled`] instead of a partial result.
    pub fn handle(&mut self, message: LspMessage, cancel: &CancellationToken) -> Result<Value> {
        let result = match message {
            LspMessage::Initialize { params } => serde_json::to_value(self.initialize(&params))?,
            LspMessage::Initialized => Value::Null,
            LspMessage::Shutdown => {
                info!("Shutdown requested");
                self.shutdown_requested = true;
                Value::Null
            }
            LspMessage::Exit => Value::Null,
            LspMessage::DidOpen { params } => {
                self.did_open(&params);
                Value::Null
            }
            LspMessage::DidChange { params } => {
                self.did_change(&params);
                Value::Null
            }
            LspMessage::DidClose { params } => {
                self.did_close(&params);
                Value::Null
            }
            LspMessage::Definition { params } => serde_json::to_value(self.definition(&params, cancel))?,
            LspMessage::References { params } => serde_json::to_value(self.references(&params, cancel))?,
            LspMessage::DocumentHighlight { params } => {
                serde_json::to_value(self.document_highlight(&params))?
            }
            LspMessage::Hover { params } => serde_json::to_value(self.hover(&params, cancel))?,
            LspMessage::Completion { params } => serde_json::to_value(self.completion(&params, cancel))?,
            LspMessage::SignatureHelp { params } => serde_json::to_value(self.signature_help(&params))?,
            LspMessage::SemanticTokensFull { params } => {
                serde_json::to_value(self.semantic_tokens_full(&params, cancel))?
            }
            LspMessage::Formatting { params } => serde_json::to_value(self.formatting(&params))?,
            LspMessage::Unknown => {
                debug!("Ignoring unhandled method");
                Value::Null
            }
        };

        if cancel.is_cancelled() {
            return Err(KpcError::Cancelled);
        }
        Ok(result)
    }
}

impl Default for KpcLanguageServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MATH: &str = "file:///ws/math.kpc";
    const MAIN: &str = "file:///ws/main.kpc";

    fn open(server: &KpcLanguageServer, uri: &str, text: &str) {
        server.did_open(&DidOpenParams {
            text_document: TextDocumentItem {
                uri: uri.to_string(),
                language_id: "kpc".to_string(),
                version: 1,
                text: text.to_string(),
            },
        });
    }

    fn at(uri: &str, line: usize, character: usize) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.to_string() },
            position: Position::new(line, character),
        }
    }

    fn server() -> KpcLanguageServer {
        let server = KpcLanguageServer::new();
        open(&server, MATH, "*@module Math\n.exportregion add\n*add\n  .defnum one 1\n  addi $t1 one\n");
        open(&server, MAIN, "*@module Main\n*start\n  addi $t1 Math.add.one\n");
        server
    }

    #[test]
    fn test_server_initialization() {
        let mut server = KpcLanguageServer::new();
        let result = server.initialize(&InitializeParams::default());
        assert!(result.capabilities.hover_provider.unwrap());
        assert!(result.capabilities.references_provider.unwrap());
        let legend = result.capabilities.semantic_tokens_provider.unwrap().legend;
        assert_eq!(legend.token_types[0], "function");
    }

    #[test]
    fn test_definition_across_open_buffers() {
        let server = server();
        let location = server.definition(&at(MAIN, 2, 20), &CancellationToken::new()).unwrap();
        assert_eq!(location, Location::new(MATH, Position::new(3, 10)));
    }

    #[test]
    fn test_references_and_highlights() {
        let server = server();
        let refs = server.references(
            &ReferenceParams {
                text_document: TextDocumentIdentifier { uri: MATH.to_string() },
                position: Position::new(4, 12),
                context: None,
            },
            &CancellationToken::new(),
        );
        let found: Vec<(&str, u32)> = refs.iter().map(|l| (l.uri.as_str(), l.range.start.line)).collect();
        // buffers are scanned in URI order
        assert_eq!(found, vec![(MAIN, 2), (MATH, 3), (MATH, 4)]);

        let highlights = server.document_highlight(&at(MATH, 4, 12));
        assert_eq!(highlights.len(), 2);
    }

    #[test]
    fn test_did_change_and_close() {
        let server = server();
        server.did_change(&DidChangeParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: MATH.to_string(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                text: "*@module Math\n*add\n  .defnum one 1\n".to_string(),
            }],
        });
        // no longer exported
        assert!(server.definition(&at(MAIN, 2, 20), &CancellationToken::new()).is_none());

        server.did_close(&DidCloseParams {
            text_document: TextDocumentIdentifier { uri: MAIN.to_string() },
        });
        assert!(server.hover(&at(MAIN, 2, 20), &CancellationToken::new()).is_none());
    }

    #[test]
    fn test_handle_json_messages() {
        let mut server = server();
        let cancel = CancellationToken::new();

        let message: LspMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "textDocument/hover",
            "params": {
                "textDocument": { "uri": MAIN },
                "position": { "line": 2, "character": 20 }
            }
        }))
        .unwrap();
        let result = server.handle(message, &cancel).unwrap();
        assert_eq!(result["contents"]["value"], "\t.defnum one 1");

        let unknown: LspMessage =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "method": "$/setTrace", "params": {} })).unwrap();
        assert!(matches!(unknown, LspMessage::Unknown));

        let shutdown: LspMessage = serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 8, "method": "shutdown" })).unwrap();
        server.handle(shutdown, &cancel).unwrap();
        assert!(server.shutdown_requested());
    }

    #[test]
    fn test_cancelled_request() {
        let mut server = server();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = server.handle(
            LspMessage::References {
                params: ReferenceParams {
                    text_document: TextDocumentIdentifier { uri: MATH.to_string() },
                    position: Position::new(4, 12),
                    context: None,
                },
            },
            &cancel,
        );
        assert!(matches!(result, Err(KpcError::Cancelled)));
    }

    #[test]
    fn test_formatting_and_signature_help() {
        let server = server();
        let edits = server.formatting(&FormattingParams {
            text_document: TextDocumentIdentifier { uri: MAIN.to_string() },
            options: FormattingOptions {
                tab_size: 2,
                insert_spaces: true,
            },
        });
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].new_text, "*@module Main\n  *start\n    addi $t1 Math.add.one");

        let help = server.signature_help(&at(MAIN, 2, 11)).unwrap();
        assert_eq!(help.active_parameter, 1);
    }

    #[test]
    fn test_semantic_tokens_full() {
        let server = server();
        let tokens = server.semantic_tokens_full(
            &SemanticTokensParams {
                text_document: TextDocumentIdentifier { uri: MAIN.to_string() },
            },
            &CancellationToken::new(),
        );
        // Math, add, one on line 2
        assert_eq!(tokens.data.len(), 15);
        assert_eq!(&tokens.data[..5], &[2, 11, 4, 1, 0]);
    }
}
