//! Linkshelf RPC Server: JSON-RPC over stdin/stdout for a UI shell.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Whenever queued completions or realtime events were applied the server
//! emits {"event":"changed","applied":n}; the shell re-reads `bookmark.list`.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use linkshelf::app::{resolve_database_path, App};
use linkshelf::logging;
use linkshelf::managers::bookmark_manager::Outcome;
use linkshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, value: &Value) -> std::io::Result<()> {
    stdout.write_all(format!("{}\n", value).as_bytes()).await?;
    stdout.flush().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = SettingsEngine::new(None);
    let loaded = engine.load();
    logging::init(&engine.get_settings().logging);
    if let Err(e) = loaded {
        tracing::warn!(error = %e, "settings unreadable, using defaults");
    }

    let db_path = resolve_database_path(engine.get_settings());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut app = App::new(&db_path.to_string_lossy(), engine)?;
    tracing::info!(path = %db_path.display(), "rpc server started");

    let mut stdout = tokio::io::stdout();
    write_line(&mut stdout, &json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")})).await?;

    // Max 200 requests per second from the shell.
    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) | Err(_) => break,
                };
                if line.trim().is_empty() {
                    continue;
                }

                let req: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        write_line(&mut stdout, &json!({"id": null, "error": format!("parse error: {}", e)})).await?;
                        continue;
                    }
                };
                let id = req.get("id").cloned().unwrap_or(Value::Null);

                if !rate_limiter.check() {
                    write_line(&mut stdout, &json!({"id": id, "error": "rate limit exceeded"})).await?;
                    continue;
                }

                let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
                let params = req.get("params").cloned().unwrap_or(json!({}));

                let response = match app.handle(method, &params).await {
                    Ok(val) => json!({"id": id, "result": val}),
                    Err(err) => json!({"id": id, "error": err}),
                };
                write_line(&mut stdout, &response).await?;
            }
            _ = ticker.tick() => {}
        }

        // Completions and realtime events are applied here, never mid-request.
        let applied = app
            .manager
            .drain()
            .await
            .iter()
            .filter(|o| !matches!(o, Outcome::Discarded))
            .count();
        if applied > 0 {
            write_line(&mut stdout, &json!({"event": "changed", "applied": applied})).await?;
        }
    }

    app.shutdown();
    Ok(())
}
