use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::batch::{BatchProcessor, UploadedFile};
use crate::config::Config;
use crate::error::MapError;
use crate::lang::list_functions;
use crate::log::FileLog;

#[derive(Debug, Deserialize)]
struct FileParam {
    filename: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CallGraphParams {
    files: Vec<FileParam>,
}

#[derive(Debug, Deserialize)]
struct ParseParams {
    content: String,
}

/// Line-delimited JSON front end over [`BatchProcessor`] and [`list_functions`].
pub struct ServerState {
    processor: BatchProcessor,
}

impl ServerState {
    pub fn new(config: Config, log: Arc<dyn FileLog>) -> Self {
        Self {
            processor: BatchProcessor::new(config, log),
        }
    }

    /// Handle one request line. Blank lines produce no reply.
    pub fn handle_line(&self, line: &str) -> Option<Value> {
        if line.trim().is_empty() {
            return None;
        }

        let msg: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Some(error_reply(Value::Null, 400, format!("Malformed request: {e}")))
            }
        };

        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = msg.get("params").cloned().unwrap_or(json!({}));

        let reply = match method {
            "call_graph" => self.call_graph(id, params),
            "parse" => self.parse(id, params),
            "" => error_reply(id, 400, "Missing method".to_string()),
            other => error_reply(id, 404, format!("Method not found: {other}")),
        };
        Some(reply)
    }

    fn call_graph(&self, id: Value, params: Value) -> Value {
        let params: CallGraphParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return error_reply(id, 400, format!("Invalid params: {e}")),
        };
        let files: Vec<UploadedFile> = params
            .files
            .into_iter()
            .map(|f| UploadedFile::new(f.filename, f.content))
            .collect();

        match self.processor.process(&files) {
            Ok(out) => json!({ "id": id, "result": { "call_graph": out } }),
            Err(e @ MapError::BatchTooLarge { .. }) => error_reply(id, 413, e.to_string()),
            Err(e) => error_reply(id, 500, e.to_string()),
        }
    }

    fn parse(&self, id: Value, params: Value) -> Value {
        let params: ParseParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return error_reply(id, 400, format!("Invalid params: {e}")),
        };
        match list_functions(&params.content) {
            Ok(functions) => json!({ "id": id, "result": { "functions": functions } }),
            Err(e @ MapError::Parse { .. }) => error_reply(id, 422, e.to_string()),
            Err(e) => error_reply(id, 500, e.to_string()),
        }
    }
}

fn error_reply(id: Value, code: u16, message: String) -> Value {
    json!({ "id": id, "error": { "code": code, "message": message } })
}

/// Serve requests from stdin until EOF, one JSON reply line per request.
pub fn run_stdio_server(config: Config, log: Arc<dyn FileLog>) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let state = ServerState::new(config, log);

    for line in stdin.lock().lines() {
        let Ok(line) = line else { continue };
        if let Some(reply) = state.handle_line(&line) {
            writeln!(stdout, "{}", reply)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
