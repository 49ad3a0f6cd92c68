//! Model downloader with resume support and progress reporting via callback.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use vocalis_core::types::{
    DownloadProgress, DownloadStatus, KOKORO_MODEL, KOKORO_VOICES, ModelInfo,
};

use crate::error::{TtsError, TtsResult};

/// Check if a model file exists under the given models directory.
pub fn model_exists(models_dir: &Path, model: &ModelInfo) -> bool {
    model_path(models_dir, model).is_file()
}

/// Path of a model file under the given models directory.
pub fn model_path(models_dir: &Path, model: &ModelInfo) -> PathBuf {
    models_dir.join(model.filename)
}

fn partial_path(models_dir: &Path, model: &ModelInfo) -> PathBuf {
    models_dir.join(format!("{}.partial", model.filename))
}

/// Download `model` into `models_dir`, resuming a previous `.partial` file.
///
/// Returns immediately when the finished file is already present.
pub async fn download_model(
    models_dir: &Path,
    model: &ModelInfo,
    on_progress: impl Fn(DownloadProgress),
) -> TtsResult<PathBuf> {
    tokio::fs::create_dir_all(models_dir).await?;

    let dest = model_path(models_dir, model);
    if dest.is_file() {
        debug!("{} already present at {}", model.name, dest.display());
        on_progress(progress(
            model,
            model.expected_size,
            model.expected_size,
            DownloadStatus::Complete,
        ));
        return Ok(dest);
    }

    let partial = partial_path(models_dir, model);
    let mut existing_size = match tokio::fs::metadata(&partial).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => 0,
    };

    info!("downloading {} from {}", model.name, model.url);

    let client = reqwest::Client::new();
    let mut resp = fetch(&client, model, existing_size).await?;

    // The partial file already covers the whole remote file, or overshoots it.
    if resp.status() == reqwest::StatusCode::RANGE_NOT_SATISFIABLE && existing_size > 0 {
        let total = content_range_total(&resp).unwrap_or(model.expected_size);
        if existing_size == total {
            tokio::fs::rename(&partial, &dest).await?;
            info!("{} completed from partial file at {}", model.name, dest.display());
            on_progress(progress(model, total, total, DownloadStatus::Complete));
            return Ok(dest);
        }

        warn!(
            "discarding {} partial file ({existing_size} of {total} bytes)",
            model.name
        );
        tokio::fs::remove_file(&partial).await?;
        existing_size = 0;
        resp = fetch(&client, model, existing_size).await?;
    }

    let status = resp.status();
    let resumed = status == reqwest::StatusCode::PARTIAL_CONTENT;
    if !status.is_success() {
        return Err(TtsError::download(format!(
            "{} returned status {status}",
            model.name
        )));
    }

    let total_size = if resumed {
        content_range_total(&resp).unwrap_or(model.expected_size)
    } else {
        resp.content_length().unwrap_or(model.expected_size)
    };

    // A server that ignores Range sends the whole file again.
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(resumed)
        .truncate(!resumed)
        .open(&partial)
        .await?;

    let mut bytes_done = if resumed { existing_size } else { 0 };
    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes_done += chunk.len() as u64;
        on_progress(progress(model, bytes_done, total_size, DownloadStatus::Downloading));
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, &dest).await?;
    info!("{} saved to {}", model.name, dest.display());

    on_progress(progress(model, total_size, total_size, DownloadStatus::Complete));
    Ok(dest)
}

/// Ensure the Kokoro weights and voice pack are present. Returns
/// `(model_path, voices_path)`.
pub async fn ensure_kokoro_models(
    models_dir: &Path,
    on_progress: impl Fn(DownloadProgress),
) -> TtsResult<(PathBuf, PathBuf)> {
    let model = download_model(models_dir, &KOKORO_MODEL, &on_progress).await?;
    let voices = download_model(models_dir, &KOKORO_VOICES, &on_progress).await?;
    Ok((model, voices))
}

async fn fetch(
    client: &reqwest::Client,
    model: &ModelInfo,
    from_byte: u64,
) -> TtsResult<reqwest::Response> {
    let mut req = client.get(model.url);
    if from_byte > 0 {
        debug!("resuming {} at byte {from_byte}", model.name);
        req = req.header(reqwest::header::RANGE, format!("bytes={from_byte}-"));
    }
    Ok(req.send().await?)
}

/// Full length from `Content-Range: bytes 0-9/10` or `bytes */10`.
fn content_range_total(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

fn progress(
    model: &ModelInfo,
    bytes_done: u64,
    bytes_total: u64,
    status: DownloadStatus,
) -> DownloadProgress {
    let percent = if bytes_total == 0 {
        100.0
    } else {
        (bytes_done as f32 / bytes_total as f32 * 100.0).min(100.0)
    };
    DownloadProgress {
        model: model.name.to_string(),
        percent,
        bytes_done,
        bytes_total,
        status,
    }
}
