use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::{info, warn};

use crate::core::classifier::{ClassificationCache, ModClassifier};
use crate::core::config::Config;
use crate::core::downloader::Downloader;
use crate::core::error::{PackError, PackResult};
use crate::core::http::build_http_client;
use crate::core::java;
use crate::core::pack::{self, PackInfo};
use crate::core::server::{scripts, InstallContext, Installer};

/// What a finished conversion looks like, for the caller to summarize.
#[derive(Debug)]
pub struct ConversionReport {
    pub instance_dir: PathBuf,
    pub pack_info: PackInfo,
    pub mods_downloaded: usize,
    pub mods_failed: usize,
    pub client_mods_removed: usize,
}

/// Convert a client modpack archive into a runnable dedicated server under
/// the configured instance directory.
pub async fn convert_modpack(
    archive_path: &Path,
    config: Config,
    progress: Option<MultiProgress>,
) -> PackResult<ConversionReport> {
    if !archive_path.exists() {
        return Err(PackError::Pack(format!(
            "modpack archive not found: {:?}",
            archive_path
        )));
    }

    let config = Arc::new(config);
    let client = build_http_client(&config)?;

    // 1️⃣ Unpack and identify the platform
    let platform = pack::extract_modpack(archive_path, &config.instance_dir).await?;
    let info = platform.pack_info()?;
    info!(
        "Modpack: {} pack, Minecraft {}, {} {}",
        platform.name(),
        info.minecraft_version,
        info.loader,
        info.loader_version
    );

    // 2️⃣ Materialize the mod set
    let mut downloader = Downloader::new(client.clone(), Arc::clone(&config));
    if let Some(mp) = progress.clone() {
        downloader = downloader.with_progress(mp);
    }

    let jobs = platform.mod_jobs(&client, &config).await?;
    let outcomes = downloader.download_batch(jobs, "mods").await;
    let mods_failed = outcomes.iter().filter(|o| !o.succeeded).count();
    let mods_downloaded = outcomes.len() - mods_failed;
    if mods_failed > 0 {
        warn!(
            "{} mods failed to download; continuing without them",
            mods_failed
        );
    }

    // 3️⃣ Weed out client-only mods
    let cache = ClassificationCache::load(config.cache_path()).await;
    let mut classifier = ModClassifier::new(client.clone(), Arc::clone(&config), cache);
    if let Some(mp) = progress.clone() {
        classifier = classifier.with_progress(mp);
    }
    let client_mods_removed = classifier
        .classify_batch(&config.mods_dir(), &config.quarantine_dir())
        .await?;

    // 4️⃣ Install the server loader
    let java_version = java::ensure_java()?;
    info!("Using Java {}", java_version);

    let libraries_dir = config.libraries_dir();
    let installer = Installer::new(info.loader);
    installer
        .install(InstallContext {
            minecraft_version: &info.minecraft_version,
            loader_version: &info.loader_version,
            instance_dir: &config.instance_dir,
            libraries_dir: &libraries_dir,
            java_bin: "java",
            downloader: &downloader,
            http_client: &client,
            config: &config,
        })
        .await?;

    // 5️⃣ Final server dressing
    scripts::write_eula(&config.instance_dir).await?;
    scripts::write_launch_scripts(&config.instance_dir, info.loader).await?;
    scripts::cleanup(&config.instance_dir).await;

    info!("Server pack ready at {:?}", config.instance_dir);

    Ok(ConversionReport {
        instance_dir: config.instance_dir.clone(),
        pack_info: info,
        mods_downloaded,
        mods_failed,
        client_mods_removed,
    })
}
