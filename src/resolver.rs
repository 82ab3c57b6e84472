//! Artifact discovery: walks the search roots, collects candidates per name
//! pattern, and loads the first one that deserializes.

use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::SystemTime;

use itertools::Itertools;
use regex::Regex;

use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::ArtifactError;
use crate::model::{ArtifactLoader, JsonArtifactLoader, Predictor, Transformer};

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)[^0-9]*$").unwrap());

/// Trailing number of a candidate's file name, e.g. `12` for `model12.json`.
/// Runs too long for `u64` saturate.
pub fn numeric_suffix(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits = TRAILING_NUMBER.captures(name)?.get(1)?;
    // only overflow can fail on an all-digit run
    Some(digits.as_str().parse().unwrap_or(u64::MAX))
}

/// File-name pattern where `*` matches any run of characters and `?` one.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body: String = pattern
            .chars()
            .map(|c| match c {
                '*' => ".*".to_string(),
                '?' => ".".to_string(),
                other => regex::escape(&other.to_string()),
            })
            .collect();
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&format!("^{body}$"))?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<NamePattern> {
    patterns
        .iter()
        .filter_map(|p| match NamePattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, "ignoring unusable artifact pattern: {e}");
                None
            }
        })
        .collect()
}

/// A loaded artifact together with the file it came from.
#[derive(Debug)]
pub struct Loaded<T: ?Sized> {
    pub artifact: Arc<T>,
    pub path: PathBuf,
}

impl<T: ?Sized> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        Self {
            artifact: Arc::clone(&self.artifact),
            path: self.path.clone(),
        }
    }
}

impl<T: ?Sized> Loaded<T> {
    pub fn file_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Where an analysis gets its model and optional scaler from.
pub trait ArtifactSource: Send + Sync {
    fn resolve_model(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Predictor>>;
    fn resolve_scaler(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Transformer>>;
}

pub struct ArtifactResolver {
    roots: Vec<PathBuf>,
    model_tiers: Vec<NamePattern>,
    scaler_patterns: Vec<NamePattern>,
    loader: Arc<dyn ArtifactLoader>,
}

impl fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("roots", &self.roots)
            .field("model_tiers", &self.model_tiers.iter().map(NamePattern::as_str).collect_vec())
            .field(
                "scaler_patterns",
                &self.scaler_patterns.iter().map(NamePattern::as_str).collect_vec(),
            )
            .finish_non_exhaustive()
    }
}

impl ArtifactResolver {
    /// Resolver over `roots` with the default name patterns and JSON loader.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self::from_config(&Config::default(), roots)
    }

    pub fn from_config(config: &Config, roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            model_tiers: compile_patterns(&config.model_tiers),
            scaler_patterns: compile_patterns(&config.scaler_patterns),
            loader: Arc::new(JsonArtifactLoader),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.loader = loader;
        self
    }

    fn discover(&self, patterns: &[NamePattern]) -> Vec<PathBuf> {
        self.roots
            .iter()
            .flat_map(|root| {
                let names = list_file_names(root);
                patterns
                    .iter()
                    .flat_map(|pattern| {
                        names
                            .iter()
                            .filter(|name| pattern.matches(name))
                            .map(|name| root.join(name))
                            .collect_vec()
                    })
                    .collect_vec()
            })
            .unique()
            .collect()
    }

    /// Model candidates in load order: discovered root by root and tier by
    /// tier, then stably reordered by trailing number, highest first.
    pub fn discover_models(&self) -> Vec<PathBuf> {
        let mut candidates = self.discover(&self.model_tiers);
        candidates.sort_by_key(|p| Reverse(numeric_suffix(p)));
        tracing::debug!(count = candidates.len(), "discovered model candidates");
        candidates
    }

    /// Scaler candidates in discovery order.
    pub fn discover_scalers(&self) -> Vec<PathBuf> {
        let candidates = self.discover(&self.scaler_patterns);
        tracing::debug!(count = candidates.len(), "discovered scaler candidates");
        candidates
    }

    pub fn select_model(
        &self,
        candidates: &[PathBuf],
        diagnostics: &mut Diagnostics,
    ) -> Option<Loaded<dyn Predictor>> {
        first_loadable(
            candidates,
            |p| self.loader.load_model(p),
            DiagnosticKind::ModelLoadFailed,
            diagnostics,
        )
    }

    pub fn select_scaler(
        &self,
        candidates: &[PathBuf],
        diagnostics: &mut Diagnostics,
    ) -> Option<Loaded<dyn Transformer>> {
        first_loadable(
            candidates,
            |p| self.loader.load_scaler(p),
            DiagnosticKind::ScalerLoadFailed,
            diagnostics,
        )
    }
}

impl ArtifactSource for ArtifactResolver {
    fn resolve_model(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Predictor>> {
        self.select_model(&self.discover_models(), diagnostics)
    }

    fn resolve_scaler(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Transformer>> {
        self.select_scaler(&self.discover_scalers(), diagnostics)
    }
}

fn list_file_names(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::trace!(dir = %dir.display(), "skipping unreadable search root: {e}");
            return Vec::new();
        }
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .sorted()
        .collect()
}

fn first_loadable<T: ?Sized>(
    candidates: &[PathBuf],
    load: impl Fn(&Path) -> Result<Arc<T>, ArtifactError>,
    failure: DiagnosticKind,
    diagnostics: &mut Diagnostics,
) -> Option<Loaded<T>> {
    for path in candidates {
        match load(path) {
            Ok(artifact) => {
                tracing::info!(path = %path.display(), "selected artifact");
                return Some(Loaded {
                    artifact,
                    path: path.clone(),
                });
            }
            Err(e) => diagnostics.push(Diagnostic::new(failure, e.to_string()).at(path)),
        }
    }
    None
}

type Fingerprint = Vec<(PathBuf, Option<SystemTime>)>;

fn fingerprint(candidates: &[PathBuf]) -> Fingerprint {
    candidates
        .iter()
        .map(|p| {
            let modified = fs::metadata(p).and_then(|m| m.modified()).ok();
            (p.clone(), modified)
        })
        .collect()
}

struct CacheEntry<T: ?Sized> {
    key: Fingerprint,
    selection: Option<Loaded<T>>,
    diagnostics: Vec<Diagnostic>,
}

/// Keeps the last selection per search and reuses it while the candidate
/// files and their modification times stay the same.
pub struct CachedResolver {
    inner: ArtifactResolver,
    models: Mutex<Option<CacheEntry<dyn Predictor>>>,
    scalers: Mutex<Option<CacheEntry<dyn Transformer>>>,
}

impl fmt::Debug for CachedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedResolver")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl CachedResolver {
    pub fn new(inner: ArtifactResolver) -> Self {
        Self {
            inner,
            models: Mutex::new(None),
            scalers: Mutex::new(None),
        }
    }

    fn cached<T: ?Sized>(
        slot: &Mutex<Option<CacheEntry<T>>>,
        candidates: Vec<PathBuf>,
        select: impl FnOnce(&[PathBuf], &mut Diagnostics) -> Option<Loaded<T>>,
        diagnostics: &mut Diagnostics,
    ) -> Option<Loaded<T>> {
        let key = fingerprint(&candidates);
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = slot.as_ref().filter(|e| e.key == key) {
            tracing::debug!("reusing cached artifact selection");
            diagnostics.extend(entry.diagnostics.iter().cloned());
            return entry.selection.clone();
        }
        let start = diagnostics.len();
        let selection = select(&candidates, diagnostics);
        *slot = Some(CacheEntry {
            key,
            selection: selection.clone(),
            diagnostics: diagnostics.as_slice().get(start..).unwrap_or_default().to_vec(),
        });
        selection
    }
}

impl ArtifactSource for CachedResolver {
    fn resolve_model(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Predictor>> {
        Self::cached(
            &self.models,
            self.inner.discover_models(),
            |c, d| self.inner.select_model(c, d),
            diagnostics,
        )
    }

    fn resolve_scaler(&self, diagnostics: &mut Diagnostics) -> Option<Loaded<dyn Transformer>> {
        Self::cached(
            &self.scalers,
            self.inner.discover_scalers(),
            |c, d| self.inner.select_scaler(c, d),
            diagnostics,
        )
    }
}
