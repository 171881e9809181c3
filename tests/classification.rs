use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use serverpacker::core::classifier::{
    ClassificationCache, ModClassifier, ModProbe, SideSignal, SideSource,
};
use serverpacker::core::config::Config;
use serverpacker::core::error::{PackError, PackResult};

// ── Fixtures ────────────────────────────────────────────

fn jar_with(entry_name: &str, content: &str) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(&mut buf);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file(entry_name, options).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
    buf.into_inner()
}

fn fabric_jar(id: &str, environment: &str) -> Vec<u8> {
    jar_with(
        "fabric.mod.json",
        &format!(r#"{{"schemaVersion":1,"id":"{id}","environment":"{environment}"}}"#),
    )
}

enum Reply {
    Signal(SideSignal),
    Fail,
}

/// Scripted registry that counts how often it is consulted.
struct StubSource {
    name: &'static str,
    reply: Reply,
    calls: Arc<AtomicUsize>,
}

impl StubSource {
    fn answering(name: &'static str, signal: SideSignal) -> (Box<dyn SideSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Self {
            name,
            reply: Reply::Signal(signal),
            calls: Arc::clone(&calls),
        };
        (Box::new(source), calls)
    }

    fn failing(name: &'static str) -> (Box<dyn SideSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Self {
            name,
            reply: Reply::Fail,
            calls: Arc::clone(&calls),
        };
        (Box::new(source), calls)
    }
}

#[async_trait]
impl SideSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn lookup(&self, _probe: &ModProbe<'_>) -> PackResult<SideSignal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Signal(signal) => Ok(signal),
            Reply::Fail => Err(PackError::Other("registry unreachable".into())),
        }
    }
}

struct Workbench {
    mods: PathBuf,
    quarantine: PathBuf,
    cache_path: PathBuf,
    config: Arc<Config>,
    _dir: tempfile::TempDir,
}

fn workbench() -> Workbench {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("mods")).expect("mods dir");
    Workbench {
        mods: root.join("mods"),
        quarantine: root.join("client-mods"),
        cache_path: root.join("cache.json"),
        config: Arc::new(Config::new(root, false)),
        _dir: dir,
    }
}

impl Workbench {
    fn drop_jar(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.mods.join(name), bytes).expect("write jar");
    }

    async fn classifier(&self, sources: Vec<Box<dyn SideSource>>) -> ModClassifier {
        let cache = ClassificationCache::load(self.cache_path.clone()).await;
        ModClassifier::with_sources(Arc::clone(&self.config), cache, sources)
    }

    async fn run(&self, sources: Vec<Box<dyn SideSource>>) -> usize {
        self.classifier(sources)
            .await
            .classify_batch(&self.mods, &self.quarantine)
            .await
            .expect("classify batch")
    }
}

async fn cached_verdict(cache_path: &Path, name: &str) -> Option<String> {
    let bytes = tokio::fs::read(cache_path).await.ok()?;
    let map: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    map.get(name).and_then(|v| v.as_str()).map(str::to_string)
}

// ── Scenarios ───────────────────────────────────────────

#[tokio::test]
async fn client_descriptor_decides_when_registries_are_down() {
    let bench = workbench();
    bench.drop_jar("alpha.jar", &fabric_jar("alpha", "client"));

    let (first, _) = StubSource::failing("first");
    let (second, _) = StubSource::failing("second");
    let relocated = bench.run(vec![first, second]).await;

    assert_eq!(relocated, 1);
    assert!(!bench.mods.join("alpha.jar").exists());
    assert!(bench.quarantine.join("alpha.jar").exists());
    assert_eq!(
        cached_verdict(&bench.cache_path, "alpha.jar").await.as_deref(),
        Some("CLIENT")
    );
}

#[tokio::test]
async fn known_universal_ids_skip_the_registries() {
    let bench = workbench();
    // The declared environment would normally quarantine this file; the
    // allow-listed id wins before any lookup happens.
    bench.drop_jar("beta.jar", &fabric_jar("geckolib", "client"));

    let (source, calls) = StubSource::answering("registry", SideSignal::ClientOnly);
    let relocated = bench.run(vec![source]).await;

    assert_eq!(relocated, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(bench.mods.join("beta.jar").exists());
    assert_eq!(
        cached_verdict(&bench.cache_path, "beta.jar").await.as_deref(),
        Some("UNIVERSAL")
    );
}

#[tokio::test]
async fn registry_verdict_overrides_the_local_descriptor() {
    let bench = workbench();
    bench.drop_jar("gamma.jar", &fabric_jar("gamma", "*"));

    let (digest, digest_calls) = StubSource::answering("digest", SideSignal::ClientOnly);
    let (metadata, _) = StubSource::answering("metadata", SideSignal::Universal);
    let relocated = bench.run(vec![digest, metadata]).await;

    // The higher-priority ClientOnly beats both the lower-priority source
    // and the universal local descriptor.
    assert_eq!(relocated, 1);
    assert_eq!(digest_calls.load(Ordering::SeqCst), 1);
    assert!(bench.quarantine.join("gamma.jar").exists());
    assert_eq!(
        cached_verdict(&bench.cache_path, "gamma.jar").await.as_deref(),
        Some("CLIENT")
    );
}

#[tokio::test]
async fn absent_signals_fall_through_to_the_next_source() {
    let bench = workbench();
    bench.drop_jar("delta.jar", &jar_with("assets/delta/lang.json", "{}"));

    let (silent, _) = StubSource::answering("silent", SideSignal::Absent);
    let (opinionated, _) = StubSource::answering("opinionated", SideSignal::Universal);
    let relocated = bench.run(vec![silent, opinionated]).await;

    assert_eq!(relocated, 0);
    assert_eq!(
        cached_verdict(&bench.cache_path, "delta.jar").await.as_deref(),
        Some("UNIVERSAL")
    );
}

#[tokio::test]
async fn undescribed_files_without_signals_stay_put() {
    let bench = workbench();
    bench.drop_jar("epsilon.jar", &jar_with("assets/epsilon/icon.png", "png"));

    let (silent, _) = StubSource::answering("silent", SideSignal::Absent);
    let relocated = bench.run(vec![silent]).await;

    assert_eq!(relocated, 0);
    assert!(bench.mods.join("epsilon.jar").exists());
    assert_eq!(
        cached_verdict(&bench.cache_path, "epsilon.jar").await.as_deref(),
        Some("UNKNOWN")
    );
}

#[tokio::test]
async fn cached_verdicts_short_circuit_every_lookup() {
    let bench = workbench();
    bench.drop_jar("zoom.jar", &fabric_jar("zoom", "client"));
    bench.drop_jar("lith.jar", &fabric_jar("lith", "*"));

    let (first, _) = StubSource::failing("first");
    assert_eq!(bench.run(vec![first]).await, 1);

    // A re-extraction puts the quarantined jar back into mods. The second
    // run must settle both files from the cache alone.
    bench.drop_jar("zoom.jar", &fabric_jar("zoom", "client"));
    let (second, second_calls) = StubSource::answering("second", SideSignal::Universal);
    let relocated = bench.run(vec![second]).await;

    assert_eq!(relocated, 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert!(bench.quarantine.join("zoom.jar").exists());
    assert!(bench.mods.join("lith.jar").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn one_unreadable_file_never_stops_the_batch() {
    let bench = workbench();
    bench.drop_jar("healthy.jar", &fabric_jar("healthy", "*"));
    // A dangling symlink fails the read step for this file alone.
    std::os::unix::fs::symlink(bench.mods.join("missing-target"), bench.mods.join("broken.jar"))
        .expect("symlink");

    let (source, _) = StubSource::answering("registry", SideSignal::Universal);
    let relocated = bench.run(vec![source]).await;

    assert_eq!(relocated, 0);
    assert_eq!(
        cached_verdict(&bench.cache_path, "broken.jar").await.as_deref(),
        Some("ERROR")
    );
    assert_eq!(
        cached_verdict(&bench.cache_path, "healthy.jar").await.as_deref(),
        Some("UNIVERSAL")
    );
}
