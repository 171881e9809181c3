use serde::Deserialize;
use tracing::{debug, info};

use super::{LoaderKind, PackInfo};
use crate::core::config::Config;
use crate::core::downloader::DownloadJob;
use crate::core::error::{PackError, PackResult};

/// Subset of `manifest.json` the converter consults.
#[derive(Debug, Deserialize)]
pub struct CurseForgeManifest {
    pub minecraft: MinecraftSection,
    #[serde(default)]
    pub files: Vec<ManifestFileRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftSection {
    pub version: String,
    #[serde(default)]
    pub mod_loaders: Vec<ModLoaderRef>,
}

#[derive(Debug, Deserialize)]
pub struct ModLoaderRef {
    /// Combined identifier, e.g. "forge-47.2.0".
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ManifestFileRef {
    #[serde(rename = "projectID")]
    pub project_id: u32,
    #[serde(rename = "fileID")]
    pub file_id: u32,
}

// ─── Files endpoint wire models ─────────────────────────

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    data: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    id: u64,
    file_name: String,
    download_url: Option<String>,
    file_length: Option<u64>,
    #[serde(default)]
    hashes: Vec<FileHash>,
}

#[derive(Debug, Deserialize)]
struct FileHash {
    value: String,
    algo: u8,
}

const SHA1_ALGO: u8 = 1;

/// CDN path for files the API refuses to hand a URL for. The two path
/// segments split the numeric id at the thousands boundary.
fn fallback_cdn_url(id: u64, file_name: &str) -> String {
    format!(
        "https://edge.forgecdn.net/files/{}/{}/{}",
        id / 1000,
        id % 1000,
        file_name
    )
}

impl CurseForgeManifest {
    pub fn pack_info(&self) -> PackResult<PackInfo> {
        let loader_ref = self
            .minecraft
            .mod_loaders
            .first()
            .ok_or_else(|| PackError::Pack("manifest declares no mod loader".into()))?;

        let (loader_id, loader_version) = loader_ref
            .id
            .split_once('-')
            .ok_or_else(|| PackError::Pack(format!("malformed loader id {:?}", loader_ref.id)))?;

        Ok(PackInfo {
            minecraft_version: self.minecraft.version.clone(),
            loader: LoaderKind::parse(loader_id)?,
            loader_version: loader_version.to_string(),
        })
    }

    /// Resolve the manifest's file references through the mods/files endpoint
    /// and turn each into a download into the mods directory.
    pub async fn mod_jobs(
        &self,
        client: &reqwest::Client,
        config: &Config,
    ) -> PackResult<Vec<DownloadJob>> {
        let file_ids: Vec<u32> = self.files.iter().map(|f| f.file_id).collect();
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }

        info!("Resolving {} CurseForge file ids", file_ids.len());

        let url = format!("{}/v1/mods/files", config.cf_api_base());
        let resp = client
            .post(&url)
            .json(&serde_json::json!({ "fileIds": file_ids }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PackError::Pack(format!(
                "files endpoint returned {} for {}",
                resp.status(),
                url
            )));
        }

        let files = resp.json::<FilesResponse>().await?.data;

        let mods_dir = config.mods_dir();
        let mut jobs = Vec::with_capacity(files.len());

        for file in files {
            // Bundled .zip artifacts (shader packs, resource packs) are not
            // server mods.
            if file.file_name.ends_with(".zip") {
                debug!("Skipping non-mod file {}", file.file_name);
                continue;
            }

            let url = match file.download_url {
                Some(url) => url,
                None => fallback_cdn_url(file.id, &file.file_name),
            };
            let url = if config.use_mirror {
                config.rewrite_to_mirror(&url).unwrap_or(url)
            } else {
                url
            };

            let mut job = DownloadJob::new(url, mods_dir.join(&file.file_name));
            if let Some(size) = file.file_length {
                job = job.with_size(size);
            }
            if let Some(sha1) = file.hashes.iter().find(|h| h.algo == SHA1_ALGO) {
                job = job.with_sha1(sha1.value.clone());
            }
            jobs.push(job);
        }

        Ok(jobs)
    }
}
