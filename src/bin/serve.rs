//! Development server for riscbridge
//!
//! A minimal static file server for the page, the worker script and the
//! wasm artifacts. No dependencies beyond tiny_http.

use std::fs;
use std::path::{Path, PathBuf};
use tiny_http::{Header, Response, Server};

const DEFAULT_PORT: u16 = 8080;
const SITE_ROOT: &str = "site";

fn main() {
    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = format!("0.0.0.0:{}", port);
    let server = Server::http(&addr).expect("Failed to start server");

    println!("riscbridge dev server on http://localhost:{}", port);

    for request in server.incoming_requests() {
        let url_path = request.url().to_string();
        let file_path = if url_path == "/" {
            "index.html".to_string()
        } else {
            url_path.trim_start_matches('/').to_string()
        };

        let response = serve_file(&file_path);
        let _ = request.respond(response);
    }
}

fn serve_file(path: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let contents = site_path(path).and_then(|path| {
        let mime = mime_type(&path);
        fs::read(path).ok().map(|bytes| (bytes, mime))
    });

    match contents {
        Some((bytes, mime)) => {
            let header = Header::from_bytes("Content-Type", mime).unwrap();
            Response::from_data(bytes).with_header(header)
        }
        None => Response::from_string("404 Not Found")
            .with_status_code(404)
            .with_header(Header::from_bytes("Content-Type", "text/plain").unwrap()),
    }
}

/// Resolve a request path under the site root, refusing traversal.
fn site_path(path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    if relative
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return None;
    }
    Some(Path::new(SITE_ROOT).join(relative))
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("elf") => "application/octet-stream",
        _ => "application/octet-stream",
    }
}
