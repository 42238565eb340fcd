//! HTTP front end.
//!
//! A single blocking `tiny_http` loop: each request is parsed, routed and
//! answered before the next one is taken, and owns everything it touches.

use std::io::Cursor;
use std::path::PathBuf;

use log::{debug, info, warn};
use tiny_http::{Header, Method, Server, StatusCode};

use crate::router::{
    handle, Operation, Request, RequestContext, Response, DOCUMENT_FILENAME, ENVELOPE_FILENAME,
};
use crate::source::StoreDirectory;
use crate::{LiveKmlError, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_ENDPOINT: &str = "/livekml";

/// Server-level settings, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Listen address, `host:port`
    pub bind: String,
    /// Path the endpoint is served under
    pub endpoint_path: String,
    /// Directory holding the logger databases
    pub data_dir: PathBuf,
    /// Gauge renderer URL; defaults to `gauge` next to the endpoint
    pub gauge_url: Option<String>,
    /// Serve every document as plain text
    pub force_debug: bool,
    /// A first fix at the origin counts as a duplicate
    pub legacy: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            endpoint_path: DEFAULT_ENDPOINT.to_string(),
            data_dir: PathBuf::from("."),
            gauge_url: None,
            force_debug: false,
            legacy: false,
        }
    }
}

pub struct LiveKmlServer {
    options: ServerOptions,
    stores: StoreDirectory,
}

impl LiveKmlServer {
    pub fn new(options: ServerOptions) -> Self {
        let stores = StoreDirectory::new(options.data_dir.clone());
        Self { options, stores }
    }

    /// Context for one request arriving with the given `Host` header.
    pub fn context(&self, host: &str, now: i64) -> RequestContext {
        let endpoint_url = format!("http://{}{}", host, self.options.endpoint_path);
        let gauge_url = self.options.gauge_url.clone().unwrap_or_else(|| {
            let dir = self
                .options
                .endpoint_path
                .rsplit_once('/')
                .map(|(dir, _)| dir)
                .unwrap_or("");
            format!("http://{}{}/gauge", host, dir)
        });

        RequestContext {
            now,
            endpoint_url,
            gauge_url,
            force_debug: self.options.force_debug,
            legacy: self.options.legacy,
        }
    }

    fn parse(&self, url: &str) -> Option<Request> {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        (path == self.options.endpoint_path).then(|| Request::from_query(query))
    }

    /// Answer one request given its raw URL (path and query).
    pub fn respond_to(&self, url: &str, host: &str, now: i64) -> Response {
        let Some(request) = self.parse(url) else {
            return Response::text(404, "Not found\n");
        };

        debug!("[Server] {:?} {:?}", request.operation, request.config);
        handle(&request, &self.context(host, now), &self.stores)
    }

    /// Headers a GET of `url` would carry, without touching any store.
    pub fn head(&self, url: &str) -> Response {
        let Some(request) = self.parse(url) else {
            return Response::text(404, "");
        };

        let debug = request.config.debug || self.options.force_debug;
        match request.operation {
            Operation::ConfigForm => Response::html(String::new()),
            Operation::PollingEnvelope => Response::kml(String::new(), ENVELOPE_FILENAME, debug),
            Operation::TraceDocument => Response::kml(String::new(), DOCUMENT_FILENAME, debug),
        }
    }

    /// Serve until the listener fails.
    pub fn serve(&self) -> Result<()> {
        let server = Server::http(self.options.bind.as_str()).map_err(|e| LiveKmlError::Server {
            message: format!("cannot listen on {}: {}", self.options.bind, e),
        })?;

        info!(
            "[Server] Listening on http://{}{} (stores in {})",
            self.options.bind,
            self.options.endpoint_path,
            self.stores.root().display()
        );

        for request in server.incoming_requests() {
            let response = match request.method() {
                Method::Head => self.head(request.url()),
                Method::Get => {
                    let host = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Host"))
                        .map(|h| h.value.as_str().to_string())
                        .unwrap_or_else(|| self.options.bind.clone());
                    self.respond_to(request.url(), &host, chrono::Utc::now().timestamp())
                }
                _ => Response::text(405, "Method not allowed\n"),
            };

            if response.is_success() {
                info!(
                    "[Server] {} {} -> {}",
                    request.method(),
                    request.url(),
                    response.status
                );
            } else {
                warn!(
                    "[Server] {} {} -> {}",
                    request.method(),
                    request.url(),
                    response.status
                );
            }

            if let Err(e) = request.respond(to_http(response)) {
                warn!("[Server] Failed to send response: {}", e);
            }
        }

        Ok(())
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn to_http(response: Response) -> tiny_http::Response<Cursor<Vec<u8>>> {
    let mut headers: Vec<Header> = header("Content-Type", &response.content_type)
        .into_iter()
        .collect();
    if let Some(h) = response
        .content_disposition()
        .and_then(|d| header("Content-Disposition", &d))
    {
        headers.push(h);
    }

    let body = response.body.into_bytes();
    let length = body.len();
    tiny_http::Response::new(
        StatusCode(response.status),
        headers,
        Cursor::new(body),
        Some(length),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(options: ServerOptions) -> LiveKmlServer {
        LiveKmlServer::new(options)
    }

    #[test]
    fn test_context_urls() {
        let s = server(ServerOptions::default());
        let ctx = s.context("example.com:8080", 42);
        assert_eq!(ctx.now, 42);
        assert_eq!(ctx.endpoint_url, "http://example.com:8080/livekml");
        assert_eq!(ctx.gauge_url, "http://example.com:8080/gauge");

        let s = server(ServerOptions {
            endpoint_path: "/obd/live".to_string(),
            gauge_url: None,
            ..ServerOptions::default()
        });
        assert_eq!(s.context("h", 0).gauge_url, "http://h/obd/gauge");

        let s = server(ServerOptions {
            gauge_url: Some("http://gauges.local/g".to_string()),
            ..ServerOptions::default()
        });
        assert_eq!(s.context("h", 0).gauge_url, "http://gauges.local/g");
    }

    #[test]
    fn test_unknown_path_is_404() {
        let s = server(ServerOptions::default());
        let response = s.respond_to("/favicon.ico", "h", 0);
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_form_served_at_endpoint() {
        let s = server(ServerOptions::default());
        let response = s.respond_to("/livekml", "h", 0);
        assert_eq!(response.status, 200);
        assert!(response.body.contains("<form method=\"GET\">"));
    }

    #[test]
    fn test_envelope_links_back_to_host() {
        let s = server(ServerOptions::default());
        let response = s.respond_to("/livekml?stage=1", "viewer.lan:9000", 0);
        assert!(response
            .body
            .contains("<![CDATA[http://viewer.lan:9000/livekml?startdelta=10"));
    }

    #[test]
    fn test_missing_store_is_500() {
        let tmp = tempfile::TempDir::new().unwrap();
        let s = server(ServerOptions {
            data_dir: tmp.path().to_path_buf(),
            ..ServerOptions::default()
        });
        let response = s.respond_to("/livekml?stage=2&dbfilename=none.db", "h", 0);
        assert_eq!(response.status, 500);
        assert!(response.body.contains("Error opening database"));
    }

    #[test]
    fn test_head_skips_the_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let s = server(ServerOptions {
            data_dir: tmp.path().to_path_buf(),
            ..ServerOptions::default()
        });

        // A GET would fail opening this store; HEAD never opens it
        let response = s.head("/livekml?stage=2&dbfilename=none.db");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/vnd.google-earth.kml+xml");
        assert_eq!(response.attachment.as_deref(), Some("liveobd.kml"));
        assert!(response.body.is_empty());

        let response = s.head("/livekml?stage=1&debug=1");
        assert!(response.content_type.starts_with("text/plain"));
        assert!(response.attachment.is_none());

        assert!(s.head("/livekml").content_type.starts_with("text/html"));
        assert_eq!(s.head("/elsewhere").status, 404);
    }

    #[test]
    fn test_to_http_headers() {
        let response = Response::kml("<kml/>".to_string(), "liveobd.kml", false);
        let http = to_http(response);
        assert_eq!(http.status_code().0, 200);
        let names: Vec<String> = http
            .headers()
            .iter()
            .map(|h| h.field.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["Content-Type", "Content-Disposition"]);
    }
}
