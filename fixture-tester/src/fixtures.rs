//! Fixture synchronization
//!
//! Each suite has a local cache directory, `test-{suite}`, mirroring the
//! files published under `{url_root}{suite}/`. The cache is tagged with the
//! server's `version.txt`; whenever the tag is missing or differs from the
//! server's, the directory is thrown away and rebuilt. `version.txt` is
//! always the last file written, so an interrupted rebuild is retried on the
//! next run instead of being mistaken for a current cache.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use regex::Regex;

use crate::TestError;

/// Name of the version marker, both remotely and in the cache
pub const VERSION_FILE: &str = "version.txt";

/// Name of the manifest listing additional fixture files
pub const MANIFEST_FILE: &str = "testfiles.txt";

/// A named collection of fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    /// Suite identifier, e.g. `a5`
    pub name: String,
    /// URL the suite's files are published under, ending in `/`
    pub base_url: String,
    /// Local cache directory
    pub dir: PathBuf,
}

impl Suite {
    /// Create the suite `name` published under `url_root`, cached under `root`
    pub fn new(name: &str, url_root: &str, root: &Path) -> Self {
        let separator = if url_root.ends_with('/') { "" } else { "/" };
        Self {
            name: name.to_string(),
            base_url: format!("{}{}{}/", url_root, separator, name),
            dir: root.join(format!("test-{}", name)),
        }
    }

    /// URL of `file` within the suite; the empty name is the listing itself
    pub fn url(&self, file: &str) -> String {
        format!("{}{}", self.base_url, file)
    }

    /// Version marker of the local cache, if it has one
    pub fn local_version(&self) -> Option<String> {
        fs::read_to_string(self.dir.join(VERSION_FILE)).ok().map(|v| v.trim().to_string())
    }
}

/// Where fixture files come from
pub trait FixtureSource {
    /// Fetch `file` from `suite`; the empty name fetches the directory listing
    fn fetch(&self, suite: &Suite, file: &str) -> impl Future<Output = Result<Vec<u8>, TestError>>;
}

/// Fixture source backed by an HTTP server
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl FixtureSource for HttpSource {
    async fn fetch(&self, suite: &Suite, file: &str) -> Result<Vec<u8>, TestError> {
        let url = suite.url(file);
        debug!("GET {}", url);

        let transport = |message: String| TestError::Transport { url: url.clone(), message };

        let response =
            self.client.get(&url).send().await.map_err(|e| transport(e.to_string()))?;
        let response = response.error_for_status().map_err(|e| transport(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| transport(e.to_string()))?;

        Ok(body.to_vec())
    }
}

/// Fixture source serving files from memory
///
/// Every fetch is logged so callers can check what was requested.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` as `file`; the empty name sets the listing
    pub fn insert(&mut self, file: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(file.to_string(), contents.into());
    }

    /// Stop serving `file`
    pub fn remove(&mut self, file: &str) {
        self.files.remove(file);
    }

    /// Names fetched so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Forget the fetch log
    pub fn clear_log(&self) {
        if let Ok(mut log) = self.fetched.lock() {
            log.clear();
        }
    }
}

impl FixtureSource for MemorySource {
    async fn fetch(&self, suite: &Suite, file: &str) -> Result<Vec<u8>, TestError> {
        if let Ok(mut log) = self.fetched.lock() {
            log.push(file.to_string());
        }
        self.files.get(file).cloned().ok_or_else(|| TestError::Transport {
            url: suite.url(file),
            message: "HTTP status client error (404 Not Found)".to_string(),
        })
    }
}

/// Result of bringing a suite's cache up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache already matched the server
    Current { version: String },
    /// The cache was rebuilt from scratch
    Rebuilt { version: String, files: usize },
}

impl SyncOutcome {
    pub fn version(&self) -> &str {
        match self {
            Self::Current { version } | Self::Rebuilt { version, .. } => version,
        }
    }
}

/// Keeps suite caches in sync with a fixture source
pub struct FixtureStore<S> {
    source: S,
    show_progress: bool,
    listing_regex: Regex,
}

impl<S: FixtureSource> FixtureStore<S> {
    /// Create a store fetching from `source`
    pub fn new(source: S) -> Result<Self, TestError> {
        let listing_regex = Regex::new(r">([\w-]+)-input-([0-9]+)\.txt<")
            .map_err(|e| TestError::Config(format!("Invalid listing regex: {}", e)))?;
        Ok(Self { source, show_progress: false, listing_regex })
    }

    /// Show a spinner while rebuilding
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Make sure `suite`'s cache exists and matches the remote version
    pub async fn ensure_current(&self, suite: &Suite) -> Result<SyncOutcome, TestError> {
        if suite.dir.exists() && !suite.dir.is_dir() {
            return Err(TestError::Conflict(suite.dir.clone()));
        }

        if suite.dir.is_dir() {
            if let Some(local) = suite.local_version() {
                let remote = self.remote_version(suite).await?;
                if local == remote {
                    debug!("{} is up to date (version {})", suite.dir.display(), local);
                    return Ok(SyncOutcome::Current { version: local });
                }
                info!("{} is at version {}, server has {}", suite.dir.display(), local, remote);
            } else {
                info!("{} has no readable {}", suite.dir.display(), VERSION_FILE);
            }
        }

        self.rebuild(suite).await
    }

    async fn remote_version(&self, suite: &Suite) -> Result<String, TestError> {
        let bytes = self.source.fetch(suite, VERSION_FILE).await?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    /// Throw away the cache and download every fixture again
    pub async fn rebuild(&self, suite: &Suite) -> Result<SyncOutcome, TestError> {
        info!("Building {} from {}", suite.dir.display(), suite.base_url);

        if suite.dir.is_dir() {
            tokio::fs::remove_dir_all(&suite.dir).await?;
        }
        tokio::fs::create_dir_all(&suite.dir).await.map_err(|e| {
            TestError::Config(format!("Tried to create directory '{}' but failed: {}", suite.dir.display(), e))
        })?;

        let progress = self.progress_bar()?;
        let mut files = 0;

        let listing = self.source.fetch(suite, "").await?;
        for name in self.case_files(&String::from_utf8_lossy(&listing)) {
            self.copy(suite, &name).await?;
            files += 1;
            progress.inc(1);
        }

        let manifest = self.source.fetch(suite, MANIFEST_FILE).await?;
        for name in manifest_entries(&String::from_utf8_lossy(&manifest)) {
            check_relative(&name)?;
            self.copy(suite, &name).await?;
            files += 1;
            progress.inc(1);
        }

        let version = self.source.fetch(suite, VERSION_FILE).await?;
        tokio::fs::write(suite.dir.join(VERSION_FILE), &version).await?;
        progress.finish_with_message("done");

        let version = String::from_utf8_lossy(&version).trim().to_string();
        info!("Fetched {} files, version {}", files, version);
        Ok(SyncOutcome::Rebuilt { version, files })
    }

    /// Input and expected file names referenced by a listing, in order
    pub fn case_files(&self, listing: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for captures in self.listing_regex.captures_iter(listing) {
            let (program, number) = (&captures[1], &captures[2]);
            for kind in ["input", "expected"] {
                let name = format!("{}-{}-{}.txt", program, kind, number);
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        names
    }

    async fn copy(&self, suite: &Suite, name: &str) -> Result<(), TestError> {
        let contents = self.source.fetch(suite, name).await?;
        let path = suite.dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn progress_bar(&self) -> Result<ProgressBar, TestError> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} Building test directory [{elapsed_precise}] {pos} files {msg}",
        )?);
        Ok(bar)
    }
}

/// File names listed in a manifest; blank lines and `#` comments are skipped
pub fn manifest_entries(manifest: &str) -> Vec<String> {
    manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn check_relative(name: &str) -> Result<(), TestError> {
    let escapes = Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(TestError::Config(format!(
            "Manifest entry '{}' points outside the test directory",
            name
        )));
    }
    Ok(())
}
