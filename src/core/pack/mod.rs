use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::downloader::DownloadJob;
use crate::core::error::{PackError, PackResult};

pub mod curseforge;
pub mod modrinth;

pub use curseforge::CurseForgeManifest;
pub use modrinth::ModrinthIndex;

const OVERRIDES_PREFIX: &str = "overrides";

/// Server loader declared by the modpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Forge,
    NeoForge,
    Fabric,
}

impl LoaderKind {
    /// Accepts the identifiers both platforms use; "fabric-loader" is the
    /// Modrinth dependency key for Fabric.
    pub fn parse(id: &str) -> PackResult<Self> {
        match id {
            "forge" => Ok(Self::Forge),
            "neoforge" => Ok(Self::NeoForge),
            "fabric" | "fabric-loader" => Ok(Self::Fabric),
            other => Err(PackError::UnsupportedLoader(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forge => "forge",
            Self::NeoForge => "neoforge",
            Self::Fabric => "fabric",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the server installer needs to know about the pack.
#[derive(Debug, Clone)]
pub struct PackInfo {
    pub minecraft_version: String,
    pub loader: LoaderKind,
    pub loader_version: String,
}

/// Modpack platform, decoded once at ingestion from whichever manifest the
/// archive carries.
#[derive(Debug)]
pub enum PlatformKind {
    CurseForge(CurseForgeManifest),
    Modrinth(ModrinthIndex),
}

impl PlatformKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurseForge(_) => "CurseForge",
            Self::Modrinth(_) => "Modrinth",
        }
    }

    pub fn pack_info(&self) -> PackResult<PackInfo> {
        match self {
            Self::CurseForge(manifest) => manifest.pack_info(),
            Self::Modrinth(index) => index.pack_info(),
        }
    }

    /// Build the download jobs for the pack's mod set. CurseForge manifests
    /// only carry file ids and need an API round trip; Modrinth indexes
    /// carry URLs directly.
    pub async fn mod_jobs(
        &self,
        client: &reqwest::Client,
        config: &Config,
    ) -> PackResult<Vec<DownloadJob>> {
        match self {
            Self::CurseForge(manifest) => manifest.mod_jobs(client, config).await,
            Self::Modrinth(index) => index.mod_jobs(config),
        }
    }
}

/// Unpack a modpack archive into the instance directory and decode its
/// platform manifest. Only `overrides/` content lands on disk; the manifest
/// is parsed in memory and anything else in the archive is ignored.
pub async fn extract_modpack(archive_path: &Path, instance_dir: &Path) -> PackResult<PlatformKind> {
    info!("Extracting modpack into {:?}", instance_dir);

    let bytes = tokio::fs::read(archive_path)
        .await
        .map_err(|source| PackError::Io {
            path: archive_path.to_path_buf(),
            source,
        })?;

    tokio::fs::create_dir_all(instance_dir)
        .await
        .map_err(|source| PackError::Io {
            path: instance_dir.to_path_buf(),
            source,
        })?;

    let cursor = Cursor::new(&bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let mut manifest_json: Option<Vec<u8>> = None;
    let mut modrinth_index: Option<Vec<u8>> = None;
    let mut extracted = 0usize;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let enclosed = entry.enclosed_name().ok_or_else(|| {
            PackError::Pack(format!("unsafe entry path {:?} in archive", entry.name()))
        })?;

        if let Ok(rel) = enclosed.strip_prefix(OVERRIDES_PREFIX) {
            if rel.as_os_str().is_empty() {
                continue;
            }
            let out_path = instance_dir.join(rel);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| PackError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let mut out = std::fs::File::create(&out_path).map_err(|source| PackError::Io {
                path: out_path.clone(),
                source,
            })?;
            std::io::copy(&mut entry, &mut out).map_err(|source| PackError::Io {
                path: out_path,
                source,
            })?;
            extracted += 1;
        } else if entry.name() == "manifest.json" {
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).map_err(|source| PackError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
            manifest_json = Some(raw);
        } else if entry.name() == "modrinth.index.json" {
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).map_err(|source| PackError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
            modrinth_index = Some(raw);
        }
    }

    debug!("Extracted {} override files", extracted);

    if let Some(raw) = manifest_json {
        let manifest: CurseForgeManifest = serde_json::from_slice(&raw)?;
        return Ok(PlatformKind::CurseForge(manifest));
    }
    if let Some(raw) = modrinth_index {
        let index: ModrinthIndex = serde_json::from_slice(&raw)?;
        return Ok(PlatformKind::Modrinth(index));
    }

    Err(PackError::Pack(
        "archive carries neither manifest.json nor modrinth.index.json; \
         only CurseForge and Modrinth packs are supported"
            .into(),
    ))
}
