//! KPC Language Server Binary
//!
//! Speaks LSP over stdio. A reader thread frames incoming messages and
//! flips cancellation tokens for `$/cancelRequest`; the main thread handles
//! one message at a time and writes every response.

use clap::Parser;
use kpc::config::KpcConfig;
use kpc::error::KpcError;
use kpc::lsp::{KpcLanguageServer, LspMessage};
use kpc::resolve::CancellationToken;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// KPC Language Server
#[derive(Parser)]
#[command(name = "kpc-lsp")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Language server for KPC assembly", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file to use instead of the workspace's
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Accepted for editor compatibility; stdio is the only transport
    #[arg(long, hide = true)]
    stdio: bool,
}

type Pending = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// What the reader thread hands to the main loop
enum Incoming {
    Message(Value, CancellationToken),
    /// A framed body that is not JSON
    Unparseable(String),
}

/// Why a framed message could not be read
#[derive(Debug, Error)]
enum ReadError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref().map(KpcConfig::parse_file).transpose();

    // Initialize logging; stdout carries the protocol
    let level = log_level(cli.debug, config.as_ref().ok().and_then(Option::as_ref));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("Starting KPC Language Server");

    let mut server = match config {
        Ok(Some(config)) => KpcLanguageServer::with_config(config),
        Ok(None) => KpcLanguageServer::new(),
        Err(e) => {
            let path = cli.config.as_deref().unwrap_or_else(|| Path::new("-"));
            error!("Failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = mpsc::channel::<Incoming>();

    let reader_pending = Arc::clone(&pending);
    thread::spawn(move || {
        let mut reader = BufReader::new(io::stdin().lock());
        loop {
            match read_message(&mut reader) {
                Ok(Some(message)) => {
                    if message["method"] == "$/cancelRequest" {
                        let id = message["params"]["id"].to_string();
                        let pending = reader_pending.lock().unwrap_or_else(PoisonError::into_inner);
                        if let Some(token) = pending.get(&id) {
                            debug!("Cancelling request {}", id);
                            token.cancel();
                        }
                        continue;
                    }

                    let cancel = CancellationToken::new();
                    if let Some(id) = message.get("id") {
                        reader_pending
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(id.to_string(), cancel.clone());
                    }
                    if tx.send(Incoming::Message(message, cancel)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(ReadError::Parse(e)) => {
                    warn!("Unparseable message: {}", e);
                    if tx.send(Incoming::Unparseable(e.to_string())).is_err() {
                        break;
                    }
                }
                Err(ReadError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    error!("Error reading message: {}", e);
                }
                Err(ReadError::Io(e)) => {
                    error!("Input closed: {}", e);
                    break;
                }
            }
        }
    });

    let mut stdout = io::stdout();
    for incoming in rx {
        let (raw, cancel) = match incoming {
            Incoming::Message(raw, cancel) => (raw, cancel),
            Incoming::Unparseable(reason) => {
                send_message(&mut stdout, &parse_error_response(&reason));
                continue;
            }
        };
        let id = raw.get("id").cloned();
        let method = raw["method"].as_str().unwrap_or_default().to_string();
        debug!("Received {}", method);

        let result = match serde_json::from_value::<LspMessage>(raw) {
            Ok(LspMessage::Exit) => break,
            Ok(LspMessage::Unknown) if id.is_some() => Err(KpcError::MethodNotFound(method.clone())),
            Ok(message) => server.handle(message, &cancel),
            Err(e) => Err(KpcError::Protocol(e.to_string())),
        };

        let Some(id) = id else {
            if let Err(e) = result {
                warn!("Notification {} failed: {}", method, e);
            }
            continue;
        };
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.to_string());

        let response = match result {
            Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
            Err(e) => {
                debug!("Request {} failed: {}", method, e);
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": error_code(&e), "message": e.to_string() }
                })
            }
        };
        send_message(&mut stdout, &response);
    }

    info!("KPC Language Server exiting");
    std::process::exit(if server.shutdown_requested() { 0 } else { 1 });
}

/// Filter directive used when `RUST_LOG` is unset
fn log_level(debug: bool, config: Option<&KpcConfig>) -> &str {
    match config {
        _ if debug => "debug",
        Some(config) => &config.log_level,
        None => "info",
    }
}

/// Response to a body that is not JSON; its id is unknowable
fn parse_error_response(reason: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32700, "message": format!("Parse error: {}", reason) }
    })
}

/// JSON-RPC error code for a failed request
fn error_code(error: &KpcError) -> i64 {
    match error {
        KpcError::Cancelled => -32800,
        KpcError::MethodNotFound(_) => -32601,
        KpcError::Protocol(_) => -32602,
        _ => -32603,
    }
}

/// Read one `Content-Length` framed message, or `None` at end of input
fn read_message(reader: &mut impl BufRead) -> Result<Option<Value>, ReadError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok();
            }
        }
    }

    let length = content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length header"))?;
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}

fn send_message(stdout: &mut io::Stdout, message: &Value) {
    let content = message.to_string();
    let framed = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);
    let _ = stdout.write_all(framed.as_bytes());
    let _ = stdout.flush();
}
