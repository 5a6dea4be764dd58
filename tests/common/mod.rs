#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use csvpix::fetcher::FetchImage;
use csvpix::processor::CancelFlag;
use csvpix::FetchError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned response for one request path (query string ignored).
pub struct Route {
    pub path: String,
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send the headers, then hold the connection open without a body.
    pub stall_body: bool,
}

impl Route {
    pub fn new(
        path: &str,
        status: u16,
        content_type: &'static str,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.to_string(),
            status,
            content_type,
            body: body.into(),
            stall_body: false,
        }
    }

    pub fn stalled(path: &str, content_type: &'static str) -> Self {
        Self {
            stall_body: true,
            ..Self::new(path, 200, content_type, vec![0_u8; 64])
        }
    }
}

/// Minimal HTTP/1.1 server on 127.0.0.1 answering every connection with one
/// canned response, then closing it.
pub struct TestServer {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub async fn start(make_routes: impl FnOnce(&str) -> Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes = Arc::new(make_routes(&base));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&routes);
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let mut buf = Vec::with_capacity(4096);
                    loop {
                        let mut tmp = [0_u8; 1024];
                        let n = socket.read(&mut tmp).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&tmp[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }

                    let req = String::from_utf8_lossy(&buf);
                    let target = req
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    seen.lock().unwrap().push(target.clone());
                    let path = target.split('?').next().unwrap_or("/");

                    let route = routes.iter().find(|r| r.path == path);
                    let (status, content_type, body, stall) = match route {
                        Some(r) => (r.status, r.content_type, r.body.clone(), r.stall_body),
                        None => (404, "text/plain", b"not found".to_vec(), false),
                    };
                    let head = format!(
                        "HTTP/1.1 {status} X\r\n\
                         Content-Type: {content_type}\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    if stall {
                        let _ = socket.flush().await;
                        std::future::pending::<()>().await;
                    }
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base, requests }
    }

    /// Accepts connections and never answers them.
    pub async fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self {
            base,
            requests: Arc::default(),
        }
    }

    /// Request targets (path + query) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
pub enum Answer {
    Save(&'static str),
    NoMatch,
    Fail,
}

/// In-memory fetcher: writes a stub file for `Save` answers and records
/// every query it is asked about.
#[derive(Default)]
pub struct FakeFetcher {
    answers: HashMap<String, Answer>,
    calls: Mutex<Vec<String>>,
    fail_all: bool,
    /// Raised once the first fetch has finished.
    cancel_after_first: Option<CancelFlag>,
}

impl FakeFetcher {
    pub fn new(answers: &[(&str, Answer)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(q, a)| (q.to_string(), a.clone()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    /// Answers like [`FakeFetcher::new`], raising `cancel` after the first call.
    pub fn cancelling(answers: &[(&str, Answer)], cancel: CancelFlag) -> Self {
        Self {
            cancel_after_first: Some(cancel),
            ..Self::new(answers)
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchImage for FakeFetcher {
    async fn fetch(&self, query: &str, dir: &Path) -> Result<Option<String>, FetchError> {
        self.calls.lock().unwrap().push(query.to_string());
        let result = self.answer(query, dir);
        if let Some(cancel) = &self.cancel_after_first {
            cancel.cancel();
        }
        result
    }
}

impl FakeFetcher {
    fn answer(&self, query: &str, dir: &Path) -> Result<Option<String>, FetchError> {
        if self.fail_all {
            return Err(FetchError::Search("network unreachable".to_string()));
        }
        match self.answers.get(query) {
            Some(Answer::Save(name)) => {
                let path = dir.join(name);
                std::fs::write(&path, b"image-bytes")
                    .map_err(|source| FetchError::Io { path, source })?;
                Ok(Some(name.to_string()))
            }
            Some(Answer::Fail) => Err(FetchError::Search("network unreachable".to_string())),
            Some(Answer::NoMatch) | None => Ok(None),
        }
    }
}
