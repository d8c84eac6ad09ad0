//! Streaming download of one selected track.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, declared_content_length};
use super::error::DownloadError;
use super::filename::{destination_path, partial_path, track_filename};
use super::progress::Progress;
use crate::source::Track;

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Final on-disk path.
    pub path: PathBuf,
    /// Bytes written to `path`.
    pub bytes_written: u64,
    /// Content-Length the server declared, if any.
    pub content_length: Option<u64>,
}

/// Downloads tracks into a destination directory.
///
/// Bytes are streamed into a hidden `.{name}.part` sibling and renamed over
/// the final name only after the whole body arrived, so the final filename
/// never holds a partial transfer.
#[derive(Debug, Clone, Default)]
pub struct DownloadManager {
    client: HttpClient,
}

impl DownloadManager {
    /// Creates a manager that downloads through `client`.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Downloads `track` into `destination_dir` without cancellation.
    ///
    /// # Errors
    ///
    /// See [`DownloadManager::download_with_cancel`].
    pub async fn download<F>(
        &self,
        track: &Track,
        destination_dir: &Path,
        headers: &HeaderMap,
        on_progress: F,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        F: FnMut(Progress),
    {
        self.download_with_cancel(
            track,
            destination_dir,
            headers,
            &CancellationToken::new(),
            on_progress,
        )
        .await
    }

    /// Downloads `track` into `destination_dir`, calling `on_progress` once per
    /// non-empty chunk in arrival order.
    ///
    /// `destination_dir` is created if needed. `headers` are the owning
    /// source's download headers. `cancel` is checked between chunk reads.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidRecord`] if `download_url` or `ext` is empty
    /// - [`DownloadError::InvalidUrl`] if the URL is not HTTP(S)
    /// - [`DownloadError::HttpStatus`] on a non-2xx response (no file is created)
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport errors
    /// - [`DownloadError::Integrity`] if the body is shorter or longer than declared
    /// - [`DownloadError::Io`] on filesystem errors
    /// - [`DownloadError::Cancelled`] if `cancel` fires
    #[instrument(skip(self, track, headers, cancel, on_progress), fields(url = %track.download_url))]
    pub async fn download_with_cancel<F>(
        &self,
        track: &Track,
        destination_dir: &Path,
        headers: &HeaderMap,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        F: FnMut(Progress),
    {
        let url = track.download_url.trim();
        if url.is_empty() {
            return Err(DownloadError::invalid_record("download_url"));
        }
        if track.ext.trim().is_empty() {
            return Err(DownloadError::invalid_record("ext"));
        }

        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|e| DownloadError::io(destination_dir, e))?;

        let filename = track_filename(&track.song_name, &track.ext);
        let final_path = destination_path(destination_dir, &filename)?;
        let part_path = partial_path(&final_path);

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled {
                url: url.to_string(),
            });
        }

        let response = self.client.get(url, headers).await?;
        let content_length = declared_content_length(&response);
        debug!(
            path = %final_path.display(),
            content_length = ?content_length,
            "streaming download"
        );

        let streamed =
            stream_to_part(response, url, &part_path, content_length, cancel, &mut on_progress)
                .await;
        let bytes_written = match streamed {
            Ok(bytes) => bytes,
            Err(error) => {
                discard_partial(&part_path).await;
                return Err(error);
            }
        };

        if let Some(expected) = content_length
            && expected != bytes_written
        {
            discard_partial(&part_path).await;
            return Err(DownloadError::integrity(&final_path, expected, bytes_written));
        }

        if let Err(error) = tokio::fs::rename(&part_path, &final_path).await {
            discard_partial(&part_path).await;
            return Err(DownloadError::io(&final_path, error));
        }

        info!(
            path = %final_path.display(),
            bytes = bytes_written,
            "download complete"
        );

        Ok(DownloadOutcome {
            path: final_path,
            bytes_written,
            content_length,
        })
    }
}

async fn stream_to_part<F>(
    response: reqwest::Response,
    url: &str,
    part_path: &Path,
    content_length: Option<u64>,
    cancel: &CancellationToken,
    on_progress: &mut F,
) -> Result<u64, DownloadError>
where
    F: FnMut(Progress),
{
    let file = File::create(part_path)
        .await
        .map_err(|e| DownloadError::io(part_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DownloadError::Cancelled { url: url.to_string() });
            }
            next = stream.next() => next,
        };
        let Some(chunk_result) = next else {
            break;
        };
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;
        if chunk.is_empty() {
            continue;
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(part_path, e))?;
        bytes_written += chunk.len() as u64;
        on_progress(Progress::from_counts(bytes_written, content_length));
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(part_path, e))?;

    if bytes_written == 0 && content_length == Some(0) {
        on_progress(Progress::Percent(100));
    }
    Ok(bytes_written)
}

async fn discard_partial(part_path: &Path) {
    match tokio::fs::remove_file(part_path).await {
        Ok(()) => debug!(path = %part_path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %part_path.display(), error = %e, "could not remove partial file"),
    }
}
