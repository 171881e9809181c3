use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::core::error::PackResult;
use crate::core::fingerprint::Fingerprint;

/// Outcome of one registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideSignal {
    /// Registry positively says the mod only runs on clients.
    ClientOnly,
    /// Registry positively says the mod belongs on servers too.
    Universal,
    /// Registry has no opinion on this file.
    Absent,
}

/// What a lookup may consult for one file; borrowed from the classifier's
/// per-file state.
pub struct ModProbe<'a> {
    pub file_name: &'a str,
    pub fingerprint: &'a Fingerprint,
    pub mod_id: Option<&'a str>,
}

/// One pluggable lookup strategy. Implementations swallow their own
/// transport mishaps into `Err`, which the classifier logs and treats as
/// an absent signal.
#[async_trait]
pub trait SideSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup(&self, probe: &ModProbe<'_>) -> PackResult<SideSignal>;
}

/// Shared verdict rule: client-only iff the client requirement is
/// "required" while the server requirement is not.
fn side_signal(client: Option<&str>, server: Option<&str>) -> SideSignal {
    if client == Some("required") && server != Some("required") {
        SideSignal::ClientOnly
    } else {
        SideSignal::Universal
    }
}

// ── Digest registry (Modrinth) ──────────────────────────

pub struct ModrinthSource {
    client: Client,
    base: String,
}

impl ModrinthSource {
    pub fn new(client: Client, base: String) -> Self {
        Self { client, base }
    }
}

#[derive(Debug, Deserialize)]
struct VersionFileResponse {
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(default)]
    client_side: Option<String>,
    #[serde(default)]
    server_side: Option<String>,
}

#[async_trait]
impl SideSource for ModrinthSource {
    fn name(&self) -> &'static str {
        "modrinth"
    }

    /// A version-file hit is decisive either way: the project's side flags
    /// settle the verdict. A miss is an absent signal.
    async fn lookup(&self, probe: &ModProbe<'_>) -> PackResult<SideSignal> {
        let url = format!(
            "{}/v2/version_file/{}?algorithm=sha1",
            self.base, probe.fingerprint.digest_hex
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(SideSignal::Absent);
        }

        let version: VersionFileResponse = response.json().await?;
        let Some(project_id) = version.project_id else {
            return Ok(SideSignal::Absent);
        };

        let url = format!("{}/v2/project/{}", self.base, project_id);
        let project: ProjectResponse = self.client.get(&url).send().await?.json().await?;

        Ok(side_signal(
            project.client_side.as_deref(),
            project.server_side.as_deref(),
        ))
    }
}

// ── Metadata registry (DeEarth) ─────────────────────────

pub struct DeEarthSource {
    client: Client,
    base: String,
}

impl DeEarthSource {
    pub fn new(client: Client, base: String) -> Self {
        Self { client, base }
    }
}

#[derive(Debug, Deserialize)]
struct ModIdResponse {
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    server: Option<String>,
}

#[async_trait]
impl SideSource for DeEarthSource {
    fn name(&self) -> &'static str {
        "deearth"
    }

    async fn lookup(&self, probe: &ModProbe<'_>) -> PackResult<SideSignal> {
        let Some(mod_id) = probe.mod_id else {
            return Ok(SideSignal::Absent);
        };

        let url = format!("{}/modid?modid={}", self.base, mod_id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(SideSignal::Absent);
        }

        let info: ModIdResponse = response.json().await?;
        Ok(side_signal(info.client.as_deref(), info.server.as_deref()))
    }
}

// ── Fingerprint registry (CurseForge) ───────────────────

/// The fingerprint endpoint confirms a match but its public surface
/// carries no client/server flags, so this source never decides; a hit is
/// only logged.
pub struct CurseForgeFingerprintSource {
    client: Client,
    base: String,
}

impl CurseForgeFingerprintSource {
    pub fn new(client: Client, base: String) -> Self {
        Self { client, base }
    }
}

#[derive(Debug, Deserialize)]
struct FingerprintResponse {
    data: FingerprintData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintData {
    #[serde(default)]
    exact_matches: Vec<FingerprintMatch>,
}

#[derive(Debug, Deserialize)]
struct FingerprintMatch {
    id: i64,
}

#[async_trait]
impl SideSource for CurseForgeFingerprintSource {
    fn name(&self) -> &'static str {
        "curseforge-fingerprints"
    }

    async fn lookup(&self, probe: &ModProbe<'_>) -> PackResult<SideSignal> {
        let url = format!("{}/v1/fingerprints", self.base);
        let body = serde_json::json!({ "fingerprints": [probe.fingerprint.content_hash] });
        let response = self.client.post(&url).json(&body).send().await?;

        if response.status().is_success() {
            let parsed: FingerprintResponse = response.json().await?;
            if let Some(m) = parsed.data.exact_matches.first() {
                debug!(
                    "Fingerprint match for {} (CurseForge mod {}); registry has no side info",
                    probe.file_name, m.id
                );
            }
        }

        Ok(SideSignal::Absent)
    }
}
