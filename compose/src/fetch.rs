// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Source resolution - turning each ROM's `file` reference into bytes.
//!
//! The core builder never performs I/O; it hands out [`FileSpec`]s and this
//! module resolves them.  HTTP(S) sources are fetched with a bounded retry
//! (3 attempts, exponential backoff, 60s total); zip archives have one
//! member extracted by name.  Tests inject [`MemoryFetcher`] instead.
//!
//! [`FileSpec`]: onerom_gen::builder::FileSpec

use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use zip::ZipArchive;

/// Attempts made for one transient-failing URL.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Total time allowed for fetching one URL, including retries.
pub const FETCH_DEADLINE: Duration = Duration::from_secs(60);

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Failure while resolving a source to bytes.
#[derive(Debug)]
pub enum FetchError {
    Failed {
        url: String,
        kind: String,
    },
    ArchiveMemberMissing {
        archive: String,
        member: String,
        available: Vec<String>,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Failed { url, kind } => {
                write!(f, "Failed to fetch {}: {}", url, kind)
            }
            FetchError::ArchiveMemberMissing {
                archive,
                member,
                available,
            } => {
                write!(
                    f,
                    "Failed to find '{}' in {} - archive contains: {}",
                    member,
                    archive,
                    available.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for FetchError {}

/// Capability for turning source references into bytes.
///
/// Production uses [`HttpFetcher`]; tests use [`MemoryFetcher`].
pub trait SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    fn open_local(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Blocking HTTPS fetcher with bounded retry.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let deadline = Instant::now() + FETCH_DEADLINE;
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = String::new();

        for attempt in 1..=FETCH_ATTEMPTS {
            info!("Downloading {} (attempt {})", url, attempt);

            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().map_err(|e| FetchError::Failed {
                            url: url.to_string(),
                            kind: e.to_string(),
                        })?;
                        return Ok(bytes.to_vec());
                    }
                    // Client errors won't improve on retry
                    if status.is_client_error() {
                        return Err(FetchError::Failed {
                            url: url.to_string(),
                            kind: format!("HTTP {}", status),
                        }
                        .into());
                    }
                    last_error = format!("HTTP {}", status);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < FETCH_ATTEMPTS && Instant::now() + backoff < deadline {
                warn!("Fetch of {} failed ({}), retrying", url, last_error);
                thread::sleep(backoff);
                backoff *= 2;
            } else {
                break;
            }
        }

        Err(FetchError::Failed {
            url: url.to_string(),
            kind: last_error,
        }
        .into())
    }

    fn open_local(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("Failed to read ROM file: {}", path.display()))
    }
}

/// Resolves one source reference: local read or HTTP fetch, then optional
/// zip member extraction.
pub fn resolve_source(
    fetcher: &dyn SourceFetcher,
    source: &str,
    zip_member: Option<&str>,
) -> Result<Vec<u8>> {
    let raw = if source.starts_with("http://") || source.starts_with("https://") {
        fetcher.fetch(source)?
    } else {
        fetcher.open_local(Path::new(source))?
    };

    match zip_member {
        Some(member) => extract_zip_member(source, &raw, member),
        None => Ok(raw),
    }
}

fn extract_zip_member(source: &str, raw: &[u8], member: &str) -> Result<Vec<u8>> {
    // Member names may arrive URL-encoded (spaces and friends)
    let decoded = urlencoding::decode(member)
        .with_context(|| format!("Failed to URL decode zip member '{}'", member))?;

    let cursor = Cursor::new(raw);
    let mut archive = ZipArchive::new(cursor)
        .with_context(|| format!("Failed to open {} as a zip archive", source))?;

    let names: Vec<String> = archive.file_names().map(|s| s.to_string()).collect();
    if !names.iter().any(|n| n == decoded.as_ref()) {
        return Err(FetchError::ArchiveMemberMissing {
            archive: source.to_string(),
            member: decoded.into_owned(),
            available: names,
        }
        .into());
    }

    debug!("Extracting {} from {}", decoded, source);
    let mut file = archive
        .by_name(decoded.as_ref())
        .with_context(|| format!("Failed to extract {} from {}", decoded, source))?;
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut contents)
        .with_context(|| format!("Failed to read {} from {}", decoded, source))?;

    Ok(contents)
}

/// In-memory fetcher for tests: maps URLs and paths to canned bytes.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pub entries: std::collections::BTreeMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, data: Vec<u8>) {
        self.entries.insert(source.to_string(), data);
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.entries.get(url).cloned().ok_or_else(|| {
            FetchError::Failed {
                url: url.to_string(),
                kind: "not present in memory fetcher".to_string(),
            }
            .into()
        })
    }

    fn open_local(&self, path: &Path) -> Result<Vec<u8>> {
        self.fetch(&path.display().to_string())
    }
}
