//! NFT metadata glue
//!
//! Fetches an NFT's off-chain JSON and media file, preferring copies cached
//! under the cache directory as `<mint>.json` and `<mint>.<ext>`.

use anyhow::{Context, Result};
use bytes::Bytes;
use inscribe_core::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Media types accepted from `properties.files`
const FILE_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif"];

/// Off-chain NFT JSON, decoded with only the fields inscription needs
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NftMetadata {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub animation_url: Option<String>,

    #[serde(default)]
    pub properties: Option<NftProperties>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NftProperties {
    #[serde(default)]
    pub files: Vec<NftFile>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NftFile {
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

impl NftMetadata {
    /// Media to inscribe: `animation_url`, then `image`, then the first
    /// png/jpeg/gif listed in `properties.files`
    pub fn media_uri(&self) -> Option<&str> {
        non_empty(&self.animation_url)
            .or_else(|| non_empty(&self.image))
            .or_else(|| {
                self.properties.as_ref()?.files.iter().find_map(|file| {
                    let media_type = file.media_type.as_deref()?;
                    if FILE_MEDIA_TYPES.contains(&media_type) {
                        non_empty(&file.uri)
                    } else {
                        None
                    }
                })
            })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Raw JSON bytes plus their decoded form
#[derive(Debug, Clone)]
pub struct FetchedJson {
    pub bytes: Bytes,
    pub metadata: NftMetadata,
    pub cached: bool,
}

/// Raw media bytes
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub path: PathBuf,
    pub cached: bool,
}

/// HTTP fetcher backed by an on-disk cache
pub struct MetadataFetcher {
    http: reqwest::Client,
    cache_dir: PathBuf,
}

impl MetadataFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory holding `<mint>.json` and `<mint>.<ext>`
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetch and decode an NFT's JSON
    pub async fn fetch_json(&self, mint: &Address, uri: &str) -> Result<FetchedJson> {
        let path = self.cache_dir.join(format!("{}.json", mint));

        let (bytes, cached) = if fs::try_exists(&path).await.unwrap_or(false) {
            let bytes = fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            (Bytes::from(bytes), true)
        } else {
            let bytes = self.download(uri).await?;
            self.store(&path, &bytes).await?;
            (bytes, false)
        };

        let metadata: NftMetadata = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid metadata JSON for {}", mint))?;
        debug!(mint = %mint, bytes = bytes.len(), cached, "Fetched metadata JSON");

        Ok(FetchedJson {
            bytes,
            metadata,
            cached,
        })
    }

    /// Fetch an NFT's media file
    pub async fn fetch_media(&self, mint: &Address, uri: &str) -> Result<FetchedMedia> {
        if let Some(path) = self.cached_media(mint).await? {
            let bytes = fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(FetchedMedia {
                bytes: Bytes::from(bytes),
                path,
                cached: true,
            });
        }

        let response = self
            .http
            .get(uri)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", uri))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {}", uri))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
        let bytes = response.bytes().await.context("Failed to read media body")?;

        let extension = media_extension(content_type.as_deref(), uri);
        let path = self.cache_dir.join(format!("{}.{}", mint, extension));
        self.store(&path, &bytes).await?;
        debug!(mint = %mint, bytes = bytes.len(), path = %path.display(), "Fetched media");

        Ok(FetchedMedia {
            bytes,
            path,
            cached: false,
        })
    }

    /// First `<mint>.*` cache entry that is not the JSON or a metadata sidecar
    async fn cached_media(&self, mint: &Address) -> Result<Option<PathBuf>> {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read cache directory"),
        };

        let stem = mint.to_string();
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches_mint = path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str());
            let extension = path.extension().and_then(|e| e.to_str());
            if matches_mint && !matches!(extension, Some("json") | Some("metadata")) {
                found.push(path);
            }
        }

        // read_dir order is platform dependent
        found.sort();
        Ok(found.into_iter().next())
    }

    async fn download(&self, uri: &str) -> Result<Bytes> {
        self.http
            .get(uri)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", uri))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {}", uri))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", uri))
    }

    async fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .context("Failed to create cache directory")?;
        fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// File extension for downloaded media, from the response type or the URI
fn media_extension(content_type: Option<&str>, uri: &str) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    if let Some(ext) = essence.as_deref().and_then(conventional_extension) {
        return ext.to_string();
    }

    essence
        .as_deref()
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|extensions| extensions.first())
        .map(|ext| ext.to_string())
        .or_else(|| {
            // Keep the URI's own extension when it names a known type
            let path = uri.split(['?', '#']).next().unwrap_or(uri);
            let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
            mime_guess::from_ext(&ext).first().map(|_| ext)
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// Extensions people expect for common NFT media, where mime_guess would
/// pick a rarer alias first (`jfif` for JPEG).
fn conventional_extension(essence: &str) -> Option<&'static str> {
    match essence {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "audio/mpeg" => Some("mp3"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "model/gltf-binary" => Some("glb"),
        "text/html" => Some("html"),
        _ => None,
    }
}
