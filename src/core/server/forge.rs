use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use super::installer::{InstallContext, ServerInstaller};
use crate::core::downloader::DownloadJob;
use crate::core::error::{PackError, PackResult};
use crate::core::pack::LoaderKind;

/// Installer archive entries that carry library manifests.
const PROFILE_ENTRIES: [&str; 2] = ["version.json", "install_profile.json"];

/// Shared subset of the vanilla version manifest and the installer's
/// embedded profiles; all three list libraries the same way.
#[derive(Debug, Deserialize)]
struct VersionManifest {
    #[serde(default)]
    libraries: Vec<Library>,
}

#[derive(Debug, Deserialize)]
struct Library {
    downloads: Option<LibraryDownloads>,
}

#[derive(Debug, Deserialize)]
struct LibraryDownloads {
    artifact: Option<LibraryArtifact>,
}

#[derive(Debug, Deserialize)]
struct LibraryArtifact {
    path: String,
    url: String,
    size: Option<u64>,
    sha1: Option<String>,
}

/// Handles Forge and NeoForge; the flow is identical apart from where the
/// installer jar comes from.
pub struct ForgeInstaller {
    kind: LoaderKind,
}

impl ForgeInstaller {
    pub fn new(kind: LoaderKind) -> Self {
        Self { kind }
    }

    fn installer_url(&self, ctx: &InstallContext<'_>) -> String {
        match self.kind {
            LoaderKind::NeoForge => format!(
                "{}/neoforge/version/{}/download/installer.jar",
                ctx.config.bmclapi, ctx.loader_version
            ),
            _ => format!(
                "{}/forge/download?mcversion={}&version={}&category=installer&format=jar",
                ctx.config.bmclapi, ctx.minecraft_version, ctx.loader_version
            ),
        }
    }

    /// Rewrite a library URL onto the BMCLAPI maven mirror. Forge and
    /// NeoForge publish under a "/releases" root the mirror flattens away.
    /// None for entries without a fetchable URL; the installer unpacks
    /// those from its own archive.
    fn mirror_maven_url(bmclapi: &str, url: &str, strip_releases: bool) -> Option<String> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let path = if strip_releases {
            parsed.path().replace("/releases", "")
        } else {
            parsed.path().to_string()
        };
        Some(format!("{}/maven{}", bmclapi, path))
    }

    fn collect_jobs(
        bmclapi: &str,
        libraries_dir: &Path,
        manifest: &VersionManifest,
        strip_releases: bool,
        seen: &mut BTreeSet<PathBuf>,
        jobs: &mut Vec<DownloadJob>,
    ) {
        for lib in &manifest.libraries {
            let Some(artifact) = lib.downloads.as_ref().and_then(|d| d.artifact.as_ref()) else {
                continue;
            };
            let Some(url) = Self::mirror_maven_url(bmclapi, &artifact.url, strip_releases) else {
                continue;
            };

            // The vanilla manifest and the installer profiles overlap;
            // one job per destination.
            let dest = libraries_dir.join(&artifact.path);
            if !seen.insert(dest.clone()) {
                continue;
            }

            let mut job = DownloadJob::new(url, dest);
            if let Some(size) = artifact.size {
                job = job.with_size(size);
            }
            if let Some(sha1) = &artifact.sha1 {
                job = job.with_sha1(sha1.clone());
            }
            jobs.push(job);
        }
    }

    async fn library_jobs(
        &self,
        ctx: &InstallContext<'_>,
        installer_bytes: &[u8],
    ) -> PackResult<Vec<DownloadJob>> {
        let mut jobs = Vec::new();
        let mut seen = BTreeSet::new();

        let url = format!(
            "{}/version/{}/json",
            ctx.config.bmclapi, ctx.minecraft_version
        );
        let resp = ctx.http_client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(PackError::Install(format!(
                "version manifest returned {} for {}",
                resp.status(),
                url
            )));
        }
        let manifest = resp.json::<VersionManifest>().await?;
        Self::collect_jobs(
            &ctx.config.bmclapi,
            ctx.libraries_dir,
            &manifest,
            false,
            &mut seen,
            &mut jobs,
        );

        let cursor = Cursor::new(installer_bytes);
        let mut archive = zip::ZipArchive::new(cursor)?;
        for name in PROFILE_ENTRIES {
            let Ok(file) = archive.by_name(name) else {
                continue;
            };
            let profile: VersionManifest = serde_json::from_reader(file)?;
            Self::collect_jobs(
                &ctx.config.bmclapi,
                ctx.libraries_dir,
                &profile,
                true,
                &mut seen,
                &mut jobs,
            );
        }

        Ok(jobs)
    }
}

#[async_trait::async_trait]
impl ServerInstaller for ForgeInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<()> {
        info!(
            "Installing {} server {} for Minecraft {}",
            self.kind, ctx.loader_version, ctx.minecraft_version
        );

        // 1️⃣ Installer jar; nothing works without it
        let installer_name = format!("{}-installer.jar", self.kind.as_str());
        let installer_path = ctx.instance_dir.join(&installer_name);
        ctx.downloader
            .fetch_one(&self.installer_url(&ctx), &installer_path)
            .await?;

        let installer_bytes =
            tokio::fs::read(&installer_path)
                .await
                .map_err(|source| PackError::Io {
                    path: installer_path.clone(),
                    source,
                })?;

        // 2️⃣ Prefetch libraries through the mirror so the installer finds
        // them on disk instead of hitting upstream mavens one by one
        let jobs = self.library_jobs(&ctx, &installer_bytes).await?;
        let outcomes = ctx
            .downloader
            .download_batch(jobs, &format!("{} libraries", self.kind))
            .await;
        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        if failed > 0 {
            warn!(
                "{} libraries could not be prefetched; the installer will fetch them itself",
                failed
            );
        }

        // 3️⃣ Vanilla server jar, placed where the installer expects it
        let server_jar_url = format!(
            "{}/version/{}/server",
            ctx.config.bmclapi, ctx.minecraft_version
        );
        let server_jar_dest = ctx
            .libraries_dir
            .join("net")
            .join("minecraft")
            .join("server")
            .join(ctx.minecraft_version)
            .join(format!("server-{}.jar", ctx.minecraft_version));
        if let Err(e) = ctx
            .downloader
            .fetch_one(&server_jar_url, &server_jar_dest)
            .await
        {
            warn!("Vanilla server jar prefetch failed: {}", e);
        }

        // 4️⃣ Hand over to the official installer
        let output = std::process::Command::new(ctx.java_bin)
            .arg("-jar")
            .arg(&installer_path)
            .arg("--installServer")
            .current_dir(ctx.instance_dir)
            .output()
            .map_err(|e| PackError::JavaExecution(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(PackError::Install(format!(
                "{} installer failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.kind,
                output.status.code(),
                stdout,
                stderr
            )));
        }

        info!("{} server installed", self.kind);
        Ok(())
    }
}
