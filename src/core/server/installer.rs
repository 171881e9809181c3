use std::path::Path;

use async_trait::async_trait;

use crate::core::config::Config;
use crate::core::downloader::Downloader;
use crate::core::error::PackResult;
use crate::core::pack::LoaderKind;

use super::{fabric::FabricInstaller, forge::ForgeInstaller};

/// Everything an installer needs for one run. Extending it does not break
/// installer signatures.
pub struct InstallContext<'a> {
    pub minecraft_version: &'a str,
    pub loader_version: &'a str,
    pub instance_dir: &'a Path,
    pub libraries_dir: &'a Path,
    /// Probed Java binary; installers shell out to it.
    pub java_bin: &'a str,
    pub downloader: &'a Downloader,
    pub http_client: &'a reqwest::Client,
    pub config: &'a Config,
}

#[async_trait]
pub trait ServerInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<()>;
}

/// Dispatcher without Box<dyn>. NeoForge shares the Forge install flow;
/// only the installer artifact differs.
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn new(loader: LoaderKind) -> Self {
        match loader {
            LoaderKind::Fabric => Self::Fabric(FabricInstaller),
            LoaderKind::Forge | LoaderKind::NeoForge => {
                Self::Forge(ForgeInstaller::new(loader))
            }
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> PackResult<()> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
        }
    }
}
