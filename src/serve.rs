//! Development server with live reload support.
//!
//! ```text
//! ┌─────────────────┐          ┌──────────────────┐
//! │   Main Thread   │          │  Watcher Thread  │
//! │  (HTTP Server)  │          │  (File Monitor)  │
//! └────────┬────────┘          └────────┬─────────┘
//!          │                            │
//!          ▼                            ▼
//!   serve output dir             debounced rebuild
//!   /__statik__/reload  ◄─────── LiveReload::mark_rebuilt()
//! ```
//!
//! Pages built with live reload poll `/__statik__/reload` and refresh
//! when the timestamp moves.

use crate::{config::ServeConfig, log, reload::LiveReload};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants
// ============================================================================

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

const RELOAD_ENDPOINT: &str = "/__statik__/reload";
const SCRIPT_ENDPOINT: &str = "/__statik__/livereload.js";

const LIVE_RELOAD_JS: &str = r"(function () {
  var last = null;
  function poll() {
    fetch('/__statik__/reload', { cache: 'no-store' })
      .then(function (r) { return r.json(); })
      .then(function (data) {
        if (last !== null && data.timestamp !== last) { location.reload(); return; }
        last = data.timestamp;
        setTimeout(poll, 500);
      })
      .catch(function () { setTimeout(poll, 2000); });
  }
  poll();
})();
";

// ============================================================================
// Server Entry Point
// ============================================================================

/// Bind the configured interface, moving up from the configured port if taken.
pub fn bind(config: &ServeConfig) -> Result<(Server, SocketAddr)> {
    let interface: IpAddr = config
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", config.interface))?;
    try_bind_port(interface, config.port, MAX_PORT_RETRIES)
}

/// Serve `output` on an already bound `server` until Ctrl+C.
pub fn serve_site(server: Server, addr: SocketAddr, output: PathBuf, reload: LiveReload) -> Result<()> {
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &output, &reload) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// What a request path maps to.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Reload,
    Script,
    File(PathBuf),
    NotFound,
}

/// Resolution order: reload endpoints, exact file, directory `index.html`, 404.
fn route(output: &Path, url: &str) -> Route {
    let url_path = urlencoding::decode(url).map(Cow::into_owned).unwrap_or_default();
    let path = url_path.split(['?', '#']).next().unwrap_or_default();

    match path {
        RELOAD_ENDPOINT => return Route::Reload,
        SCRIPT_ENDPOINT => return Route::Script,
        _ => {}
    }

    let request_path = Path::new(path.trim_matches('/'));
    if request_path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Route::NotFound;
    }

    let local_path = output.join(request_path);
    if local_path.is_file() {
        return Route::File(local_path);
    }
    let index = local_path.join("index.html");
    if index.is_file() {
        return Route::File(index);
    }
    Route::NotFound
}

fn handle_request(request: Request, output: &Path, reload: &LiveReload) -> Result<()> {
    match route(output, request.url()) {
        Route::Reload => {
            let body = serde_json::json!({ "timestamp": reload.timestamp() }).to_string();
            respond(request, body.into_bytes(), "application/json; charset=utf-8", true)
        }
        Route::Script => respond(
            request,
            LIVE_RELOAD_JS.as_bytes().to_vec(),
            "application/javascript; charset=utf-8",
            true,
        ),
        Route::File(path) => {
            let content = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            respond(request, content, guess_content_type(&path), false)
        }
        Route::NotFound => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header {name}: {value}"))
}

fn respond(request: Request, content: Vec<u8>, content_type: &str, no_cache: bool) -> Result<()> {
    let mut response = Response::from_data(content).with_header(header("Content-Type", content_type)?);
    if no_cache {
        response = response.with_header(header("Cache-Control", "no-store")?);
    }
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("posts/hello")).unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::write(dir.path().join("posts/hello/index.html"), "hello").unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn test_route_files_and_index() {
        let dir = output();
        let root = dir.path();

        assert_eq!(route(root, "/"), Route::File(root.join("index.html")));
        assert_eq!(route(root, "/posts/hello/"), Route::File(root.join("posts/hello/index.html")));
        assert_eq!(route(root, "/style.css?t=1"), Route::File(root.join("style.css")));
        assert_eq!(route(root, "/missing/"), Route::NotFound);
        assert_eq!(route(root, "/posts/"), Route::NotFound);
    }

    #[test]
    fn test_route_reload_endpoints() {
        let dir = output();
        assert_eq!(route(dir.path(), "/__statik__/reload?since=3"), Route::Reload);
        assert_eq!(route(dir.path(), SCRIPT_ENDPOINT), Route::Script);
    }

    #[test]
    fn test_route_rejects_traversal() {
        let dir = output();
        let inner = dir.path().join("posts");
        assert_eq!(route(&inner, "/../index.html"), Route::NotFound);
        assert_eq!(route(&inner, "/%2e%2e/style.css"), Route::NotFound);
    }

    #[test]
    fn test_bind_moves_past_taken_port() {
        let taken = Server::http("127.0.0.1:0").unwrap();
        let port = taken.server_addr().to_ip().unwrap().port();
        let config = ServeConfig {
            interface: "127.0.0.1".into(),
            port,
            watch: false,
        };

        let (_server, addr) = bind(&config).unwrap();
        assert_ne!(addr.port(), port);
        assert!(addr.port() > port);
    }

    #[test]
    fn test_bind_rejects_bad_interface() {
        let config = ServeConfig {
            interface: "not-an-ip".into(),
            ..ServeConfig::default()
        };
        assert!(bind(&config).is_err());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("feed.xml")), "application/xml; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }
}
