//! Shared helpers for integration tests: in-process source fakes and a raw
//! HTTP server that controls chunking and Content-Length exactly.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use musicdl_core::{SourceClient, SourceError, SourceId, Track};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A source that returns a fixed list of tracks (or a fixed failure).
pub struct FakeSource {
    pub id: SourceId,
    pub display_name: String,
    pub tracks: Result<Vec<Track>, u16>,
    pub delay: Duration,
    pub referer: Option<&'static str>,
}

impl FakeSource {
    pub fn ok(id: &str, tracks: Vec<Track>) -> Self {
        Self {
            id: SourceId::new(id),
            display_name: format!("{id} music"),
            tracks: Ok(tracks),
            delay: Duration::ZERO,
            referer: None,
        }
    }

    pub fn failing(id: &str, status: u16) -> Self {
        Self {
            tracks: Err(status),
            ..Self::ok(id, Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_referer(mut self, referer: &'static str) -> Self {
        self.referer = Some(referer);
        self
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn search(&self, _keyword: &str) -> Result<Vec<Track>, SourceError> {
        tokio::time::sleep(self.delay).await;
        match &self.tracks {
            Ok(tracks) => Ok(tracks.clone()),
            Err(status) => Err(SourceError::HttpStatus {
                source_id: self.id.clone(),
                status: *status,
            }),
        }
    }

    fn download_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(referer) = self.referer {
            headers.insert(REFERER, HeaderValue::from_static(referer));
        }
        headers
    }
}

/// Builds a track record the way a source backend would.
pub fn track(source: &str, singer: &str, song: &str, url: &str, ext: &str) -> Track {
    Track {
        singers: singer.to_string(),
        song_name: song.to_string(),
        file_size: "1.00MB".to_string(),
        duration: "03:00".to_string(),
        album: "Album".to_string(),
        source: SourceId::new(source),
        download_url: url.to_string(),
        ext: ext.to_string(),
    }
}

/// How the raw server frames its body.
#[derive(Debug, Clone, Copy)]
pub enum Framing {
    /// Send `Content-Length: n` (may disagree with the bytes actually sent).
    ContentLength(u64),
    /// Send `Transfer-Encoding: chunked`, no declared length.
    Chunked,
}

/// Serves exactly one request, writing `chunks` with a pause between each so
/// the client observes them as separate reads. Returns the URL to fetch.
pub async fn serve_chunks(chunks: Vec<Vec<u8>>, framing: Framing, path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let header = match framing {
            Framing::ContentLength(len) => format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n"
            ),
            Framing::Chunked => "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_string(),
        };
        if socket.write_all(header.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;

        for chunk in chunks {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let written = match framing {
                Framing::ContentLength(_) => socket.write_all(&chunk).await,
                Framing::Chunked => {
                    let mut framed = format!("{:x}\r\n", chunk.len()).into_bytes();
                    framed.extend_from_slice(&chunk);
                    framed.extend_from_slice(b"\r\n");
                    socket.write_all(&framed).await
                }
            };
            if written.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
        if matches!(framing, Framing::Chunked) {
            let _ = socket.write_all(b"0\r\n\r\n").await;
        }
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}{path}")
}

/// Names of all entries in `dir`, sorted.
pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
