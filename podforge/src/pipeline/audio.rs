//! Audio assembly: clipping a sub-range out of one asset, and merging up
//! to three assets into one.
//!
//! All ffmpeg work is stream-copy; nothing is re-encoded. Every ephemeral
//! file created here is tracked and removed on success and failure alike;
//! caller-owned local inputs are never touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::storage::ObjectStorage;
use crate::utils::fs::{ScratchFiles, ensure_dir, scratch_path};
use crate::utils::url::as_local_path;
use crate::{Error, Result};

/// A clipped audio asset persisted to durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedAudio {
    pub url: String,
    pub storage_key: String,
}

/// A merged audio asset persisted to durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAudio {
    pub url: String,
    pub storage_key: String,
}

/// Clipping seam used by highlight generation, so batch clipping can be
/// exercised without spawning ffmpeg.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioClipper: Send + Sync {
    async fn clip(
        &self,
        source_url: &str,
        offset_secs: f64,
        duration_secs: f64,
        storage_key: &str,
    ) -> Result<ClippedAudio>;
}

#[async_trait]
impl AudioClipper for AudioAssembler {
    async fn clip(
        &self,
        source_url: &str,
        offset_secs: f64,
        duration_secs: f64,
        storage_key: &str,
    ) -> Result<ClippedAudio> {
        AudioAssembler::clip(self, source_url, offset_secs, duration_secs, storage_key).await
    }
}

/// Clip and merge operations over audio assets.
pub struct AudioAssembler {
    http: reqwest::Client,
    storage: Arc<dyn ObjectStorage>,
    ffmpeg_path: String,
    work_dir: PathBuf,
}

impl AudioAssembler {
    pub fn new(
        http: reqwest::Client,
        storage: Arc<dyn ObjectStorage>,
        ffmpeg_path: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            storage,
            ffmpeg_path: ffmpeg_path.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Extract `[offset, offset + duration)` from `source_url` into a new
    /// durable asset.
    pub async fn clip(
        &self,
        source_url: &str,
        offset_secs: f64,
        duration_secs: f64,
        storage_key: &str,
    ) -> Result<ClippedAudio> {
        if duration_secs <= 0.0 {
            return Err(Error::validation("clip duration must be positive"));
        }
        if offset_secs < 0.0 {
            return Err(Error::validation("clip offset must not be negative"));
        }
        ensure_dir(&self.work_dir).await?;

        let mut scratch = ScratchFiles::new();
        let result = self
            .clip_inner(source_url, offset_secs, duration_secs, storage_key, &mut scratch)
            .await;
        scratch.cleanup().await;
        result
    }

    async fn clip_inner(
        &self,
        source_url: &str,
        offset_secs: f64,
        duration_secs: f64,
        storage_key: &str,
        scratch: &mut ScratchFiles,
    ) -> Result<ClippedAudio> {
        let input = self.materialize(source_url, scratch).await?;
        let output = scratch_path(&self.work_dir, "clip", "mp3");
        scratch.track(&output);

        // -ss before -i for fast seeking; stream copy keeps the bytes.
        let args = build_clip_args(&input, offset_secs, duration_secs, &output);
        self.run_ffmpeg(&args).await?;

        let bytes = tokio::fs::read(&output).await?;
        let url = self
            .storage
            .put(storage_key, bytes.into(), "audio/mpeg")
            .await?;

        info!(storage_key, offset_secs, duration_secs, "Clipped audio asset");
        Ok(ClippedAudio {
            url,
            storage_key: storage_key.to_string(),
        })
    }

    /// Concatenate the present inputs in intro → main → outro order into a
    /// new durable asset.
    ///
    /// With exactly one input present the concatenation step is skipped
    /// entirely: the materialized bytes are stored unmodified.
    pub async fn merge(
        &self,
        intro_url: Option<&str>,
        main_url: Option<&str>,
        outro_url: Option<&str>,
        storage_key: &str,
    ) -> Result<MergedAudio> {
        let inputs: Vec<&str> = [intro_url, main_url, outro_url]
            .into_iter()
            .flatten()
            .collect();
        if inputs.is_empty() {
            return Err(Error::invalid_input("merge requires at least one audio input"));
        }
        ensure_dir(&self.work_dir).await?;

        let mut scratch = ScratchFiles::new();
        let result = self.merge_inner(&inputs, storage_key, &mut scratch).await;
        scratch.cleanup().await;
        result
    }

    async fn merge_inner(
        &self,
        inputs: &[&str],
        storage_key: &str,
        scratch: &mut ScratchFiles,
    ) -> Result<MergedAudio> {
        let mut local_inputs = Vec::with_capacity(inputs.len());
        for reference in inputs {
            local_inputs.push(self.materialize(reference, scratch).await?);
        }

        if let [only] = local_inputs.as_slice() {
            // Single input: no concatenation, bytes pass through untouched.
            debug!(storage_key, "Single merge input, skipping concatenation");
            let bytes = tokio::fs::read(only).await?;
            let url = self
                .storage
                .put(storage_key, bytes.into(), "audio/mpeg")
                .await?;
            return Ok(MergedAudio {
                url,
                storage_key: storage_key.to_string(),
            });
        }

        let list_path = scratch_path(&self.work_dir, "concat", "txt");
        scratch.track(&list_path);
        tokio::fs::write(&list_path, build_concat_list(&local_inputs)).await?;

        let output = scratch_path(&self.work_dir, "merged", "mp3");
        scratch.track(&output);

        let args = build_concat_args(&list_path, &output);
        self.run_ffmpeg(&args).await?;

        let bytes = tokio::fs::read(&output).await?;
        let url = self
            .storage
            .put(storage_key, bytes.into(), "audio/mpeg")
            .await?;

        info!(storage_key, parts = inputs.len(), "Merged audio assets");
        Ok(MergedAudio {
            url,
            storage_key: storage_key.to_string(),
        })
    }

    /// Resolve a reference to a local file, downloading remote assets into
    /// the scratch set. Assets already on disk are used in place and stay
    /// owned by the caller.
    async fn materialize(&self, reference: &str, scratch: &mut ScratchFiles) -> Result<PathBuf> {
        if let Some(local) = as_local_path(reference) {
            debug!(reference, "Input already local, skipping fetch");
            return Ok(local);
        }

        let response = self
            .http
            .get(reference)
            .send()
            .await
            .map_err(|e| Error::Other(format!("failed to fetch {reference}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "failed to fetch {reference}: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Other(format!("failed to read {reference}: {e}")))?;

        let path = scratch_path(&self.work_dir, "fetch", "mp3");
        scratch.track(&path);
        tokio::fs::write(&path, &bytes).await?;
        debug!(reference, path = %path.display(), size = bytes.len(), "Materialized remote asset");
        Ok(path)
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        debug!(ffmpeg = %self.ffmpeg_path, ?args, "Running ffmpeg");
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| Error::Ffmpeg(format!("failed to spawn {}: {e}", self.ffmpeg_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Ffmpeg(format!(
                "exit code {}: {tail}",
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

fn build_clip_args(input: &Path, offset_secs: f64, duration_secs: f64, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{offset_secs:.3}"),
        "-t".to_string(),
        format!("{duration_secs:.3}"),
        "-i".to_string(),
        input.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.display().to_string(),
    ]
}

fn build_concat_args(list_path: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.display().to_string(),
    ]
}

/// Build the concat demuxer list file contents.
fn build_concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect()
}
