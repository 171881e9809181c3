use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;

/// Loader metadata embedded in a mod jar, reduced to the fields the
/// classifier actually consults.
#[derive(Debug, Clone, PartialEq)]
pub enum ModDescriptor {
    Forge(ForgeDescriptor),
    Fabric(FabricDescriptor),
}

impl ModDescriptor {
    pub fn mod_id(&self) -> Option<&str> {
        match self {
            ModDescriptor::Forge(d) => d.mod_id.as_deref(),
            ModDescriptor::Fabric(d) => d.id.as_deref(),
        }
    }

    /// Local side signal, used only when every registry is silent.
    pub fn declares_client_only(&self) -> bool {
        match self {
            ModDescriptor::Forge(d) => d.declares_client_only(),
            ModDescriptor::Fabric(d) => d.is_client_environment(),
        }
    }
}

/// From `mods.toml` / `neoforge.mods.toml`: the first declared mod and the
/// dependency entries registered under its id.
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeDescriptor {
    pub mod_id: Option<String>,
    pub dependencies: Vec<ForgeDependency>,
}

impl ForgeDescriptor {
    /// A dependency on the platform itself marked side=CLIENT is how
    /// forge-like mods declare they never run on a server.
    fn declares_client_only(&self) -> bool {
        self.dependencies.iter().any(|dep| {
            matches!(dep.mod_id.as_str(), "minecraft" | "forge" | "neoforge")
                && dep.side.as_deref() == Some("CLIENT")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForgeDependency {
    #[serde(rename = "modId", default)]
    pub mod_id: String,
    #[serde(default)]
    pub side: Option<String>,
}

/// From `fabric.mod.json`: id and environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FabricDescriptor {
    pub id: Option<String>,
    pub environment: Option<String>,
}

impl FabricDescriptor {
    fn is_client_environment(&self) -> bool {
        self.environment.as_deref() == Some("client")
    }
}

// ── Wire models ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ForgeModsToml {
    #[serde(default)]
    mods: Vec<ForgeModEntry>,
    #[serde(default)]
    dependencies: HashMap<String, Vec<ForgeDependency>>,
}

#[derive(Debug, Deserialize)]
struct ForgeModEntry {
    #[serde(rename = "modId", default)]
    mod_id: String,
}

#[derive(Debug, Deserialize)]
struct FabricModJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    environment: Option<EnvironmentField>,
}

/// `environment` is usually a string but some mods ship a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentField {
    One(String),
    Many(Vec<String>),
}

impl EnvironmentField {
    fn into_single(self) -> Option<String> {
        match self {
            EnvironmentField::One(s) => Some(s),
            EnvironmentField::Many(_) => None,
        }
    }
}

/// Pull the loader descriptor out of a jar's bytes. An unreadable archive
/// or unparsable descriptor yields None, which the classifier treats as
/// "no local signal". First matching entry in archive order wins.
pub fn read_descriptor(bytes: &[u8]) -> Option<ModDescriptor> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).ok()?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).ok()?;
        let name = entry.name().to_string();

        if name.ends_with("mods.toml") {
            let mut raw = String::new();
            entry.read_to_string(&mut raw).ok()?;
            let parsed: ForgeModsToml = toml::from_str(&raw).ok()?;
            return Some(ModDescriptor::Forge(forge_descriptor(parsed)));
        }

        if name.ends_with("fabric.mod.json") {
            let parsed: FabricModJson = serde_json::from_reader(&mut entry).ok()?;
            return Some(ModDescriptor::Fabric(FabricDescriptor {
                id: parsed.id.filter(|id| !id.is_empty()),
                environment: parsed.environment.and_then(EnvironmentField::into_single),
            }));
        }
    }

    None
}

fn forge_descriptor(mut parsed: ForgeModsToml) -> ForgeDescriptor {
    let mod_id = parsed
        .mods
        .first()
        .map(|entry| entry.mod_id.clone())
        .filter(|id| !id.is_empty());
    let dependencies = mod_id
        .as_deref()
        .and_then(|id| parsed.dependencies.remove(id))
        .unwrap_or_default();

    ForgeDescriptor {
        mod_id,
        dependencies,
    }
}
