use std::path::Path;

use chrono::Local;
use tracing::{debug, info};

use crate::core::error::{PackError, PackResult};
use crate::core::pack::LoaderKind;

/// Residue the installers leave behind, plus client-only content that has
/// no business on a server.
const CLEANUP_FILES: [&str; 6] = [
    "installer.log",
    "installer.jar",
    "fabric-installer.jar",
    "forge-installer.jar",
    "neoforge-installer.jar",
    "options.txt",
];
const CLEANUP_DIRS: [&str; 3] = ["shaderpacks", "resourcepacks", "essential"];

pub async fn write_eula(instance_dir: &Path) -> PackResult<()> {
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let content = format!(
        "#By changing the setting below to TRUE you are indicating your agreement to our EULA (https://aka.ms/MinecraftEULA).\n\
         #Generated on {}\n\
         eula=true\n",
        stamp
    );

    let path = instance_dir.join("eula.txt");
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| PackError::Io { path, source })?;
    Ok(())
}

/// Write start.bat and start.sh. Forge-family installers generate their own
/// run scripts, ours just wrap them; Fabric's launch jar is invoked
/// directly with fixed heap settings.
pub async fn write_launch_scripts(instance_dir: &Path, loader: LoaderKind) -> PackResult<()> {
    info!("Creating launch scripts");

    let (bat, sh) = match loader {
        LoaderKind::Forge | LoaderKind::NeoForge => (
            "@echo off\ncall run.bat\npause".to_string(),
            "#!/bin/bash\n./run.sh\n".to_string(),
        ),
        LoaderKind::Fabric => {
            let command = "java -Xms4G -Xmx4G -jar fabric-server-launch.jar nogui";
            (
                format!("@echo off\n{}\npause", command),
                format!("#!/bin/bash\n{}\n", command),
            )
        }
    };

    let bat_path = instance_dir.join("start.bat");
    tokio::fs::write(&bat_path, bat)
        .await
        .map_err(|source| PackError::Io {
            path: bat_path,
            source,
        })?;

    let sh_path = instance_dir.join("start.sh");
    tokio::fs::write(&sh_path, sh)
        .await
        .map_err(|source| PackError::Io {
            path: sh_path.clone(),
            source,
        })?;
    mark_executable(&sh_path)?;

    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> PackResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|source| PackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> PackResult<()> {
    Ok(())
}

/// Best-effort removal; a leftover file is not worth failing a finished
/// conversion over.
pub async fn cleanup(instance_dir: &Path) {
    info!("Cleaning up temporary files");

    for name in CLEANUP_FILES {
        let path = instance_dir.join(name);
        if tokio::fs::remove_file(&path).await.is_ok() {
            debug!("Removed {:?}", path);
        }
    }

    for name in CLEANUP_DIRS {
        let path = instance_dir.join(name);
        if tokio::fs::remove_dir_all(&path).await.is_ok() {
            debug!("Removed {:?}", path);
        }
    }
}
