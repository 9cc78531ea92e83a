use std::io::{self, Write};
use serde_json::{json, Value};

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        write_json(w, env, self.pretty)?;
        writeln!(w)
    }
}

/// Human-readable rendering: one line per URL for batch results, the URL list
/// for plans, pretty JSON for anything else when `pretty` is set.
pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let (label, body) = if env.apply { ("Result", &env.result) } else { ("Plan", &env.plan) };
        writeln!(w, "{}: {}", label, env.op)?;
        let Some(body) = body else { return Ok(()) };

        if let Some(summaries) = body.get("summaries").and_then(Value::as_array) {
            for s in summaries { write_outcome(w, s)?; }
            if let Some(m) = body.get("metadata") {
                writeln!(
                    w,
                    "total={} succeeded={} partial={} failed={} tokens={} time={}s",
                    m["total_processed"], m["total_succeeded"], m["total_partial"], m["total_failed"],
                    m["total_tokens_used"], m["total_processing_time_seconds"],
                )?;
            }
        } else if let Some(urls) = body.get("urls").and_then(Value::as_array) {
            for u in urls { writeln!(w, "  {}", u.as_str().unwrap_or_default())?; }
        } else if self.pretty {
            write_json(w, body, true)?;
            writeln!(w)?;
        }
        Ok(())
    }
}

fn write_outcome(w: &mut dyn Write, s: &Value) -> io::Result<()> {
    let status = s["status"].as_str().unwrap_or("?");
    let url = s["url"].as_str().unwrap_or_default();
    match status {
        "success" => {
            let first = s["summary"].as_str().unwrap_or_default().lines().next().unwrap_or_default();
            writeln!(w, "[{status}] {url} ({} tokens): {first}", s["tokens_used"])
        }
        _ => writeln!(
            w,
            "[{status}] {url}: {} {}",
            s["error_code"].as_str().unwrap_or("UNKNOWN_ERROR"),
            s["error"].as_str().unwrap_or_default(),
        ),
    }
}

pub struct McpPresenter { pub pretty: bool }
impl Presenter for McpPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let (method, key, body) = if env.apply {
            ("notifications/result", "result", &env.result)
        } else {
            ("notifications/plan", "plan", &env.plan)
        };
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {
                "schema_version": env.schema_version,
                "request_id": env.request_id,
                "op": env.op,
                key: body,
            }
        });
        write_json(w, &payload, self.pretty)?;
        writeln!(w)
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn new(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Mcp => Box::new(McpPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout();
        self.presenter.emit(env, &mut out)?;
        out.flush()
    }
}

fn write_json<T: serde::Serialize>(w: &mut dyn Write, v: &T, pretty: bool) -> io::Result<()> {
    if pretty { serde_json::to_writer_pretty(w, v).map_err(to_io) } else { serde_json::to_writer(w, v).map_err(to_io) }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }
