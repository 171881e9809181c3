use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Public CurseForge API key shipped with the tool; users can override it
/// through the `CURSEFORGE_API_KEY` environment variable.
pub const DEFAULT_CURSEFORGE_API_KEY: &str =
    "$2a$10$bL4bIL5pUWqfcO7KQtnMReakwtfHbNKh6v1uTpKlzhwoueEJQnPnm";

const CURSEFORGE_API: &str = "https://api.curseforge.com";
const MODRINTH_API: &str = "https://api.modrinth.com";
const MIRROR_HOST: &str = "https://mod.mcimirror.top";
const DEEARTH_API: &str = "https://dearth.0771010.xyz/api";
const BMCLAPI: &str = "https://bmclapi2.bangbang93.com";

/// One mirrored CDN. URLs under `mirror_prefix` are served by the caching
/// mirror, URLs under `origin_prefix` by the authoritative upstream.
/// Substitution works in both directions and preserves the rest of the URL.
#[derive(Debug, Clone)]
pub struct MirrorRule {
    pub mirror_prefix: String,
    pub origin_prefix: String,
}

impl MirrorRule {
    pub fn new(mirror_prefix: impl Into<String>, origin_prefix: impl Into<String>) -> Self {
        Self {
            mirror_prefix: mirror_prefix.into(),
            origin_prefix: origin_prefix.into(),
        }
    }

    /// Rewrite a mirror URL back to its origin form, if it matches.
    pub fn to_origin(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.mirror_prefix.as_str())
            .map(|rest| format!("{}{}", self.origin_prefix, rest))
    }

    /// Rewrite an origin URL into its mirror form, if it matches.
    pub fn to_mirror(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.origin_prefix.as_str())
            .map(|rest| format!("{}{}", self.mirror_prefix, rest))
    }
}

/// Immutable run configuration, built once at startup and shared by
/// reference. Components never consult ambient state for any of this.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefer the community mirror for API calls and file downloads.
    pub use_mirror: bool,
    pub curseforge_api_key: String,
    pub deearth_api: String,
    pub bmclapi: String,
    /// Global cap on simultaneous in-flight transfers.
    pub download_concurrency: usize,
    /// How many transfers may actively stream at once (one progress row each).
    pub display_slots: usize,
    /// Attempts per download job, mirror fallback included.
    pub download_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    pub classify_concurrency: usize,
    pub http_timeout: Duration,
    pub mirror_rules: Vec<MirrorRule>,
    /// Mod ids that are always treated as universal, never queried.
    pub known_universal_mods: HashSet<String>,
    /// Output tree that becomes the dedicated server.
    pub instance_dir: PathBuf,
}

impl Config {
    pub fn new(instance_dir: PathBuf, use_mirror: bool) -> Self {
        let curseforge_api_key = std::env::var("CURSEFORGE_API_KEY")
            .unwrap_or_else(|_| DEFAULT_CURSEFORGE_API_KEY.to_string());

        Self {
            use_mirror,
            curseforge_api_key,
            deearth_api: DEEARTH_API.to_string(),
            bmclapi: BMCLAPI.to_string(),
            download_concurrency: 16,
            display_slots: 5,
            download_retries: 3,
            backoff_base: Duration::from_secs(1),
            classify_concurrency: 10,
            http_timeout: Duration::from_secs(60),
            mirror_rules: vec![
                // Both CDNs sit behind one mirror host; the path shape
                // (forgecdn /files/ vs modrinth /data/) picks the origin.
                MirrorRule::new(
                    format!("{MIRROR_HOST}/files/"),
                    "https://edge.forgecdn.net/files/",
                ),
                MirrorRule::new(
                    format!("{MIRROR_HOST}/data/"),
                    "https://cdn.modrinth.com/data/",
                ),
            ],
            known_universal_mods: ["geckolib", "supplementaries"]
                .into_iter()
                .map(String::from)
                .collect(),
            instance_dir,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.curseforge_api_key = key.into();
        self
    }

    // ── API bases ───────────────────────────────────────

    pub fn cf_api_base(&self) -> String {
        if self.use_mirror {
            format!("{MIRROR_HOST}/curseforge")
        } else {
            CURSEFORGE_API.to_string()
        }
    }

    pub fn mr_api_base(&self) -> String {
        if self.use_mirror {
            format!("{MIRROR_HOST}/modrinth")
        } else {
            MODRINTH_API.to_string()
        }
    }

    // ── Mirror rewrites ─────────────────────────────────

    /// First matching rule wins; None when the URL is not a mirror URL.
    pub fn rewrite_to_origin(&self, url: &str) -> Option<String> {
        self.mirror_rules.iter().find_map(|r| r.to_origin(url))
    }

    /// First matching rule wins; None when no mirror serves this URL.
    pub fn rewrite_to_mirror(&self, url: &str) -> Option<String> {
        self.mirror_rules.iter().find_map(|r| r.to_mirror(url))
    }

    // ── Instance layout ─────────────────────────────────

    pub fn mods_dir(&self) -> PathBuf {
        self.instance_dir.join("mods")
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.instance_dir.join(".client-mods")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.instance_dir.join(".classifier_cache.json")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.instance_dir.join("libraries")
    }
}
