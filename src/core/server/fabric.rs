use async_trait::async_trait;
use tracing::info;

use super::installer::{InstallContext, ServerInstaller};
use crate::core::error::{PackError, PackResult};

const FABRIC_INSTALLER_URL: &str =
    "https://maven.fabricmc.net/net/fabricmc/fabric-installer/1.0.3/fabric-installer-1.0.3.jar";

/// Drives the official Fabric installer in server mode. The installer
/// provisions the loader, its libraries and the vanilla server jar itself.
pub struct FabricInstaller;

#[async_trait]
impl ServerInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<()> {
        info!(
            "Installing Fabric server {} for Minecraft {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let installer_path = ctx.instance_dir.join("fabric-installer.jar");
        ctx.downloader
            .fetch_one(FABRIC_INSTALLER_URL, &installer_path)
            .await?;

        let output = std::process::Command::new(ctx.java_bin)
            .arg("-jar")
            .arg(&installer_path)
            .arg("server")
            .args(["-mcver", ctx.minecraft_version])
            .args(["-loader", ctx.loader_version])
            .arg("-dir")
            .arg(ctx.instance_dir)
            .arg("-downloadMinecraft")
            .current_dir(ctx.instance_dir)
            .output()
            .map_err(|e| PackError::JavaExecution(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(PackError::Install(format!(
                "fabric installer failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
                output.status.code(),
                stdout,
                stderr
            )));
        }

        info!("Fabric server installed");
        Ok(())
    }
}
