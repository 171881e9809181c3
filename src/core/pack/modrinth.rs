use std::collections::HashMap;
use std::path::{Component, Path};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{LoaderKind, PackInfo};
use crate::core::config::Config;
use crate::core::downloader::DownloadJob;
use crate::core::error::{PackError, PackResult};

/// Loader keys a Modrinth index may declare, in lookup order.
const LOADER_DEPENDENCIES: [&str; 3] = ["forge", "neoforge", "fabric-loader"];

/// Subset of `modrinth.index.json` the converter consults.
#[derive(Debug, Deserialize)]
pub struct ModrinthIndex {
    #[serde(default)]
    pub files: Vec<IndexFile>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    /// Install path relative to the instance root, e.g. "mods/sodium.jar".
    pub path: String,
    #[serde(default)]
    pub hashes: IndexHashes,
    #[serde(default)]
    pub downloads: Vec<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexHashes {
    pub sha1: Option<String>,
}

impl ModrinthIndex {
    pub fn pack_info(&self) -> PackResult<PackInfo> {
        let minecraft_version = self
            .dependencies
            .get("minecraft")
            .cloned()
            .ok_or_else(|| PackError::Pack("index declares no minecraft version".into()))?;

        let (loader_id, loader_version) = LOADER_DEPENDENCIES
            .iter()
            .find_map(|key| self.dependencies.get(*key).map(|v| (*key, v.clone())))
            .ok_or_else(|| {
                PackError::UnsupportedLoader("none declared in index dependencies".into())
            })?;

        Ok(PackInfo {
            minecraft_version,
            loader: LoaderKind::parse(loader_id)?,
            loader_version,
        })
    }

    /// The index carries download URLs directly; no API round trip needed.
    pub fn mod_jobs(&self, config: &Config) -> PackResult<Vec<DownloadJob>> {
        let mut jobs = Vec::with_capacity(self.files.len());

        for file in &self.files {
            if file.path.ends_with(".zip") {
                debug!("Skipping non-mod file {}", file.path);
                continue;
            }

            // Install paths come from the pack author; never let one climb
            // out of the instance directory.
            let relative = Path::new(&file.path);
            if relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(PackError::Pack(format!(
                    "unsafe install path {:?} in index",
                    file.path
                )));
            }

            let Some(url) = file.downloads.first() else {
                warn!("Index entry {} has no download URL, skipping", file.path);
                continue;
            };
            let url = if config.use_mirror {
                config.rewrite_to_mirror(url).unwrap_or_else(|| url.clone())
            } else {
                url.clone()
            };

            let mut job = DownloadJob::new(url, config.instance_dir.join(relative));
            if let Some(size) = file.file_size {
                job = job.with_size(size);
            }
            if let Some(sha1) = &file.hashes.sha1 {
                job = job.with_sha1(sha1.clone());
            }
            jobs.push(job);
        }

        Ok(jobs)
    }
}
