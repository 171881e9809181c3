mod cache;
mod descriptor;
mod sources;

pub use cache::{ClassificationCache, Verdict};
pub use descriptor::{
    read_descriptor, FabricDescriptor, ForgeDependency, ForgeDescriptor, ModDescriptor,
};
pub use sources::{
    CurseForgeFingerprintSource, DeEarthSource, ModProbe, ModrinthSource, SideSignal, SideSource,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::error::{PackError, PackResult};
use crate::core::fingerprint::Fingerprint;

/// Decides, one jar at a time, whether a mod belongs on the server.
///
/// Cascade per file: cache, known-universal override, concurrent registry
/// lookups, local descriptor fallback. A CLIENT verdict moves the file
/// into the quarantine directory before it is recorded; any per-file
/// failure becomes an ERROR verdict and never stops the batch.
pub struct ModClassifier {
    config: Arc<Config>,
    cache: ClassificationCache,
    /// Lookup strategies in decision-priority order.
    sources: Vec<Box<dyn SideSource>>,
    limiter: Semaphore,
    progress: Option<MultiProgress>,
}

impl ModClassifier {
    pub fn new(client: Client, config: Arc<Config>, cache: ClassificationCache) -> Self {
        let sources: Vec<Box<dyn SideSource>> = vec![
            Box::new(ModrinthSource::new(client.clone(), config.mr_api_base())),
            Box::new(DeEarthSource::new(client.clone(), config.deearth_api.clone())),
            Box::new(CurseForgeFingerprintSource::new(client, config.cf_api_base())),
        ];
        Self::with_sources(config, cache, sources)
    }

    /// Custom source set; vector order is the decision priority.
    pub fn with_sources(
        config: Arc<Config>,
        cache: ClassificationCache,
        sources: Vec<Box<dyn SideSource>>,
    ) -> Self {
        let limiter = Semaphore::new(config.classify_concurrency);
        Self {
            config,
            cache,
            sources,
            limiter,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// Classify every `.jar` in `mods_dir`, relocating client-only files
    /// into `quarantine_dir`. Returns how many files were relocated. The
    /// cache is written back exactly once, after all files finish.
    pub async fn classify_batch(
        &self,
        mods_dir: &Path,
        quarantine_dir: &Path,
    ) -> PackResult<usize> {
        for dir in [mods_dir, quarantine_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PackError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
        }

        let jar_files = collect_jars(mods_dir).await?;
        info!("Classifying {} mods from {:?}", jar_files.len(), mods_dir);

        let bar = self.progress.as_ref().map(|mp| {
            let pb = mp.add(ProgressBar::new(jar_files.len() as u64));
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.blue} {prefix:>12.cyan.bold} [{wide_bar:.cyan/blue}] {pos}/{len}",
                )
                .unwrap()
                .progress_chars("#>-"),
            );
            pb.set_prefix("classify");
            pb
        });

        let relocated = futures_util::future::join_all(jar_files.into_iter().map(|path| {
            let bar = bar.as_ref();
            async move {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .expect("classifier semaphore closed");
                let moved = self.classify_file(&path, quarantine_dir).await;
                if let Some(pb) = bar {
                    pb.inc(1);
                }
                moved
            }
        }))
        .await
        .into_iter()
        .filter(|moved| *moved)
        .count();

        if let Some(pb) = bar {
            pb.finish_and_clear();
        }

        self.cache.save().await?;

        if relocated > 0 {
            info!("Removed {} client-only mods", relocated);
        } else {
            info!("No client-only mods detected");
        }
        Ok(relocated)
    }

    /// Returns whether the file was relocated. Never errors: failures turn
    /// into an ERROR verdict for this file alone.
    async fn classify_file(&self, path: &Path, quarantine_dir: &Path) -> bool {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return false,
        };

        // Step 1: the cache is authoritative for names it knows.
        if let Some(verdict) = self.cache.get(&name) {
            if verdict == Verdict::Client {
                match self.quarantine(path, quarantine_dir, &name).await {
                    Ok(()) => return true,
                    Err(e) => {
                        warn!("Could not quarantine cached client mod {}: {}", name, e);
                        return false;
                    }
                }
            }
            debug!("Cache hit for {}: {}", name, verdict);
            return false;
        }

        match self.classify_fresh(path, &name, quarantine_dir).await {
            Ok(moved) => moved,
            Err(e) => {
                warn!("Classification failed for {}: {}", name, e);
                self.cache.set(name, Verdict::Error);
                false
            }
        }
    }

    /// Full cascade for a file the cache has never seen.
    async fn classify_fresh(
        &self,
        path: &Path,
        name: &str,
        quarantine_dir: &Path,
    ) -> PackResult<bool> {
        let bytes = tokio::fs::read(path).await.map_err(|e| PackError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let descriptor = read_descriptor(&bytes);
        let mod_id = descriptor.as_ref().and_then(ModDescriptor::mod_id);

        // Step 2: allow-listed ids never hit the network.
        if let Some(id) = mod_id {
            if self.config.known_universal_mods.contains(id) {
                debug!("{} is a known universal mod ({})", name, id);
                self.cache.set(name, Verdict::Universal);
                return Ok(false);
            }
        }

        // Step 3: registry cascade.
        let fingerprint = Fingerprint::of(&bytes);
        let probe = ModProbe {
            file_name: name,
            fingerprint: &fingerprint,
            mod_id,
        };
        let signal = self.consult_sources(&probe).await;

        // Steps 4 and 5: local descriptor fallback, else no signal.
        let verdict = match signal {
            SideSignal::ClientOnly => Verdict::Client,
            SideSignal::Universal => Verdict::Universal,
            SideSignal::Absent => match &descriptor {
                Some(d) if d.declares_client_only() => Verdict::Client,
                _ => Verdict::Unknown,
            },
        };

        if verdict == Verdict::Client {
            // The move happens before the verdict is recorded.
            self.quarantine(path, quarantine_dir, name).await?;
            self.cache.set(name, Verdict::Client);
            debug!("Quarantined client-only mod {}", name);
            return Ok(true);
        }

        self.cache.set(name, verdict);
        debug!("Classified {} as {}", name, verdict);
        Ok(false)
    }

    /// All sources race concurrently; the first decisive signal in
    /// priority order wins. Source errors degrade to an absent signal.
    async fn consult_sources(&self, probe: &ModProbe<'_>) -> SideSignal {
        let lookups = self.sources.iter().map(|source| source.lookup(probe));
        let results = futures_util::future::join_all(lookups).await;

        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(SideSignal::Absent) => {}
                Ok(signal) => {
                    debug!("{} resolved {} as {:?}", source.name(), probe.file_name, signal);
                    return signal;
                }
                Err(e) => {
                    debug!("{} lookup for {} failed: {}", source.name(), probe.file_name, e);
                }
            }
        }
        SideSignal::Absent
    }

    /// Rename, never copy: quarantined files leave the mods directory in
    /// one step.
    async fn quarantine(&self, path: &Path, quarantine_dir: &Path, name: &str) -> PackResult<()> {
        let target = quarantine_dir.join(name);
        tokio::fs::rename(path, &target)
            .await
            .map_err(|e| PackError::Io {
                path: target,
                source: e,
            })
    }
}

async fn collect_jars(mods_dir: &Path) -> PackResult<Vec<PathBuf>> {
    let mut jar_files = Vec::new();
    let mut dir = tokio::fs::read_dir(mods_dir)
        .await
        .map_err(|e| PackError::Io {
            path: mods_dir.to_path_buf(),
            source: e,
        })?;

    while let Some(entry) = dir.next_entry().await.map_err(|e| PackError::Io {
        path: mods_dir.to_path_buf(),
        source: e,
    })? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jar") {
            jar_files.push(path);
        }
    }

    jar_files.sort();
    Ok(jar_files)
}
