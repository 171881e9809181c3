use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::error::{PackError, PackResult};

/// A single file to fetch. Identity within a batch is the destination path.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub dest: PathBuf,
    /// Declared size, preferred over content-length for progress totals.
    pub size: Option<u64>,
    /// Expected SHA-1 (lowercase hex), verified before the file lands.
    pub sha1: Option<String>,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            size: None,
            sha1: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }
}

/// Per-job result. Batches never raise; they report.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub job: DownloadJob,
    pub succeeded: bool,
    pub bytes_transferred: u64,
    /// URL that ultimately served (or last failed) the transfer; differs
    /// from the job URL after a mirror fallback.
    pub final_url: String,
    /// 0 when the destination already existed and nothing was fetched.
    pub attempts_used: u32,
    pub last_error: Option<PackError>,
}

impl DownloadOutcome {
    fn skipped(job: DownloadJob) -> Self {
        let final_url = job.url.clone();
        Self {
            job,
            succeeded: true,
            bytes_transferred: 0,
            final_url,
            attempts_used: 0,
            last_error: None,
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.succeeded && self.attempts_used == 0
    }
}

/// Concurrent downloader with retry, exponential backoff and mirror→origin
/// fallback. Two limiters shape a batch: `inflight` caps admitted jobs,
/// `streaming_slots` caps how many bodies stream at once (one progress row
/// each). Both are released through permit guards on every exit path.
pub struct Downloader {
    client: Client,
    config: Arc<Config>,
    inflight: Semaphore,
    streaming_slots: Semaphore,
    progress: Option<MultiProgress>,
}

impl Downloader {
    pub fn new(client: Client, config: Arc<Config>) -> Self {
        let inflight = Semaphore::new(config.download_concurrency);
        let streaming_slots = Semaphore::new(config.display_slots);
        Self {
            client,
            config,
            inflight,
            streaming_slots,
            progress: None,
        }
    }

    /// Attach a terminal display. Without one the slot pool still bounds
    /// streaming concurrency, it just draws nothing.
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    // ── Batch downloads ─────────────────────────────────

    /// Run every job to completion and report one outcome per job, in job
    /// order. Individual failures are logged, never raised.
    pub async fn download_batch(
        &self,
        jobs: Vec<DownloadJob>,
        label: &str,
    ) -> Vec<DownloadOutcome> {
        if jobs.is_empty() {
            debug!("Batch '{}' has no jobs", label);
            return Vec::new();
        }

        info!(
            "Starting batch '{}': {} files, concurrency={}, slots={}",
            label,
            jobs.len(),
            self.config.download_concurrency,
            self.config.display_slots
        );

        let overall = self.progress.as_ref().map(|mp| {
            let pb = mp.add(ProgressBar::new(jobs.len() as u64));
            pb.set_style(overall_style());
            pb.set_prefix(label.to_string());
            pb
        });

        let outcomes = futures_util::future::join_all(jobs.into_iter().map(|job| {
            let overall = overall.as_ref();
            async move {
                let outcome = self.run_job(job).await;
                if let Some(pb) = overall {
                    pb.inc(1);
                }
                if let Some(err) = &outcome.last_error {
                    warn!(
                        "Download failed after {} attempts for {}: {}",
                        outcome.attempts_used, outcome.final_url, err
                    );
                }
                outcome
            }
        }))
        .await;

        if let Some(pb) = &overall {
            pb.finish_and_clear();
        }

        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        if failed > 0 {
            warn!("Batch '{}' finished: {} of {} jobs failed", label, failed, outcomes.len());
        } else {
            info!("Batch '{}' complete ({} files)", label, outcomes.len());
        }
        outcomes
    }

    async fn run_job(&self, job: DownloadJob) -> DownloadOutcome {
        let _permit = self.inflight.acquire().await.expect("download semaphore closed");

        // Idempotent re-run: an existing destination is already satisfied.
        if job.dest.exists() {
            debug!("Already present, skipping {:?}", job.dest);
            return DownloadOutcome::skipped(job);
        }

        let _slot = self.streaming_slots.acquire().await.expect("slot pool closed");

        let bar = self.progress.as_ref().map(|mp| {
            let pb = mp.add(ProgressBar::new(job.size.unwrap_or(0)));
            pb.set_style(transfer_style());
            pb.set_message(
                job.dest
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            pb
        });

        let outcome = self.run_attempts(job, bar.as_ref()).await;

        if let Some(pb) = bar {
            pb.finish_and_clear();
            if let Some(mp) = &self.progress {
                mp.remove(&pb);
            }
        }
        outcome
    }

    /// Retry loop for one job. A mirror URL that fails at the HTTP level is
    /// rewritten to its origin and retried immediately on the same attempt
    /// budget; every other failure backs off `base * 2^attemptIndex` first.
    async fn run_attempts(&self, job: DownloadJob, bar: Option<&ProgressBar>) -> DownloadOutcome {
        let retries = self.config.download_retries.max(1);
        let mut url = job.url.clone();
        let mut attempts = 0u32;
        let mut last_error = None;

        while attempts < retries {
            attempts += 1;
            match self.transfer(&url, &job, bar).await {
                Ok(bytes_transferred) => {
                    return DownloadOutcome {
                        job,
                        succeeded: true,
                        bytes_transferred,
                        final_url: url,
                        attempts_used: attempts,
                        last_error: None,
                    };
                }
                Err(err) => {
                    let http_level = matches!(err, PackError::DownloadFailed { .. });
                    if http_level && self.config.use_mirror {
                        if let Some(origin) = self.config.rewrite_to_origin(&url) {
                            warn!("Mirror failed for {} ({}), switching to origin {}", url, err, origin);
                            url = origin;
                            last_error = Some(err);
                            continue;
                        }
                    }
                    if attempts < retries {
                        let delay = self
                            .config
                            .backoff_base
                            .saturating_mul(2u32.saturating_pow(attempts - 1));
                        debug!(
                            "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                            attempts, retries, url, err, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        let _ = tokio::fs::remove_file(part_path(&job.dest)).await;
        DownloadOutcome {
            job,
            succeeded: false,
            bytes_transferred: 0,
            final_url: url,
            attempts_used: attempts,
            last_error,
        }
    }

    /// One streaming attempt. Stages into `<name>.part` and renames into
    /// place once the body (and the optional SHA-1 check) completes, so a
    /// torn transfer never occupies the destination path.
    async fn transfer(
        &self,
        url: &str,
        job: &DownloadJob,
        bar: Option<&ProgressBar>,
    ) -> PackResult<u64> {
        if let Some(parent) = job.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PackError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(pb) = bar {
            pb.set_position(0);
            if let Some(total) = job.size.or_else(|| response.content_length()) {
                pb.set_length(total);
            }
        }

        let part = part_path(&job.dest);
        let mut bytes_transferred: u64 = 0;
        let mut hasher = job.sha1.is_some().then(Sha1::new);

        // Write inside a block so the handle is dropped before the rename.
        {
            let mut file = tokio::fs::File::create(&part)
                .await
                .map_err(|e| PackError::Io {
                    path: part.clone(),
                    source: e,
                })?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(|e| PackError::Io {
                    path: part.clone(),
                    source: e,
                })?;
                bytes_transferred += chunk.len() as u64;
                if let Some(h) = hasher.as_mut() {
                    h.update(&chunk);
                }
                if let Some(pb) = bar {
                    pb.inc(chunk.len() as u64);
                }
            }

            file.flush().await.map_err(|e| PackError::Io {
                path: part.clone(),
                source: e,
            })?;
        }

        if let (Some(expected), Some(h)) = (job.sha1.as_deref(), hasher) {
            let actual = hex::encode(h.finalize());
            if actual != expected {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(PackError::Sha1Mismatch {
                    path: job.dest.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&part, &job.dest)
            .await
            .map_err(|e| PackError::Io {
                path: job.dest.clone(),
                source: e,
            })?;

        debug!("Downloaded: {} -> {:?}", url, job.dest);
        Ok(bytes_transferred)
    }

    // ── Single-shot fetch ───────────────────────────────

    /// Fail-fast fetch: no retries, no mirror fallback, first failure
    /// propagates. For artifacts the workflow cannot proceed without.
    pub async fn fetch_one(&self, url: &str, dest: &Path) -> PackResult<()> {
        if dest.exists() {
            debug!("Already present, skipping {:?}", dest);
            return Ok(());
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PackError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| PackError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            file.write_all(&bytes).await.map_err(|e| PackError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            file.flush().await.map_err(|e| PackError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Fetched: {} -> {:?}", url, dest);
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {wide_msg}",
    )
    .unwrap()
    .progress_chars("#>-")
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>12.cyan.bold} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("#>-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/mods/sodium.jar")),
            Path::new("/tmp/mods/sodium.jar.part")
        );
    }

    #[test]
    fn skipped_outcome_shape() {
        let job = DownloadJob::new("https://example.com/a.jar", "/tmp/a.jar");
        let outcome = DownloadOutcome::skipped(job);
        assert!(outcome.succeeded);
        assert!(outcome.was_skipped());
        assert_eq!(outcome.attempts_used, 0);
        assert_eq!(outcome.bytes_transferred, 0);
        assert_eq!(outcome.final_url, "https://example.com/a.jar");
    }

    #[test]
    fn job_builders_fill_optionals() {
        let job = DownloadJob::new("u", "d").with_size(42).with_sha1("ff");
        assert_eq!(job.size, Some(42));
        assert_eq!(job.sha1.as_deref(), Some("ff"));
    }
}
