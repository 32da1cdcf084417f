//! Download Commands
//!
//! `nft` fills the metadata cache with each NFT's JSON and media file without
//! inscribing anything. `inscribe nft` reads the same cache, so a download
//! ahead of time keeps the inscription run off the network.

use super::parse_mints;
use crate::config::InscribeConfig;
use crate::metadata::{FetchedJson, FetchedMedia, MetadataFetcher};
use crate::ui::{format_bytes, CHECK, INFO};
use anyhow::{anyhow, Context, Result};
use console::style;
use futures::stream::{self, StreamExt, TryStreamExt};
use inscribe_core::Address;
use inscribe_ledger::solana::TokenMetadata;
use inscribe_ledger::SolanaLedger;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// NFT download configuration
pub struct NftConfig {
    pub mints: Vec<String>,
    pub cache_dir: Option<PathBuf>,
    pub concurrency: usize,
}

/// Off-chain content of one NFT
#[derive(Debug, Clone)]
pub struct NftPayload {
    pub mint: Address,
    pub json: FetchedJson,
    /// `None` when media was not requested
    pub media: Option<FetchedMedia>,
}

/// Run `download nft`
pub async fn nft(ledger: Arc<SolanaLedger>, cfg: &InscribeConfig, config: NftConfig) -> Result<()> {
    let mints = parse_mints(&config.mints)?;
    let fetcher = MetadataFetcher::new(
        config
            .cache_dir
            .unwrap_or_else(|| cfg.inscribe.cache_dir.clone()),
    );

    println!("{} Fetching {} NFTs...", style(INFO).blue(), mints.len());
    let tokens = fetch_tokens(&ledger, &mints, config.concurrency).await?;
    let sources: Vec<(Address, String)> = mints
        .into_iter()
        .zip(tokens)
        .map(|(mint, token)| (mint, token.uri))
        .collect();

    let payloads = fetch_payloads(&fetcher, &sources, true, config.concurrency).await?;
    print_summary(&payloads);

    println!(
        "{} Cached {} NFTs in {}",
        style(CHECK).green(),
        payloads.len(),
        fetcher.cache_dir().display()
    );
    Ok(())
}

/// Token metadata of each mint, in order
pub async fn fetch_tokens(
    ledger: &Arc<SolanaLedger>,
    mints: &[Address],
    concurrency: usize,
) -> Result<Vec<TokenMetadata>> {
    stream::iter(mints)
        .map(|mint| {
            let ledger = ledger.clone();
            async move {
                ledger
                    .fetch_token_metadata(mint)
                    .await
                    .with_context(|| format!("Failed to fetch token metadata for {}", mint))
            }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Fetch the JSON, and the media it points at when `with_media` is set, for
/// each `(mint, json_uri)`. Cached copies are used when present.
pub async fn fetch_payloads(
    fetcher: &MetadataFetcher,
    sources: &[(Address, String)],
    with_media: bool,
    concurrency: usize,
) -> Result<Vec<NftPayload>> {
    stream::iter(sources)
        .map(|(mint, uri)| async move {
            let json = fetcher.fetch_json(mint, uri).await?;
            let media = if with_media {
                let media_uri = json
                    .metadata
                    .media_uri()
                    .ok_or_else(|| anyhow!("No media found for {}", mint))?;
                let media = fetcher.fetch_media(mint, media_uri).await?;
                debug!(
                    mint = %mint,
                    path = %media.path.display(),
                    cached = media.cached,
                    "Media file"
                );
                Some(media)
            } else {
                None
            };

            Ok::<_, anyhow::Error>(NftPayload {
                mint: *mint,
                json,
                media,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Print JSON and media totals with their cache hits
pub fn print_summary(payloads: &[NftPayload]) {
    let json_bytes: usize = payloads.iter().map(|p| p.json.bytes.len()).sum();
    println!(
        "{} JSON files ({} cached) are a total of {}.",
        payloads.len(),
        payloads.iter().filter(|p| p.json.cached).count(),
        format_bytes(json_bytes)
    );

    let media: Vec<&FetchedMedia> = payloads.iter().filter_map(|p| p.media.as_ref()).collect();
    if !media.is_empty() {
        let media_bytes: usize = media.iter().map(|file| file.bytes.len()).sum();
        println!(
            "{} media files ({} cached) are a total of {}.",
            media.len(),
            media.iter().filter(|file| file.cached).count(),
            format_bytes(media_bytes)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn seed_cache(dir: &TempDir, mint: &Address) {
        let json = format!(r#"{{"name":"Cached","image":"{}/{}.png"}}"#, UNREACHABLE, mint);
        std::fs::write(dir.path().join(format!("{}.json", mint)), json).unwrap();
        std::fs::write(dir.path().join(format!("{}.png", mint)), [0x89, b'P', b'N', b'G']).unwrap();
    }

    fn sources(mints: &[Address]) -> Vec<(Address, String)> {
        mints
            .iter()
            .map(|mint| (*mint, format!("{}/{}.json", UNREACHABLE, mint)))
            .collect()
    }

    #[tokio::test]
    async fn test_repeat_download_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let mints = [Address::new([1u8; 32]), Address::new([2u8; 32])];
        for mint in &mints {
            seed_cache(&dir, mint);
        }
        let fetcher = MetadataFetcher::new(dir.path());

        for _ in 0..2 {
            let payloads = fetch_payloads(&fetcher, &sources(&mints), true, 2).await.unwrap();
            assert_eq!(payloads.len(), 2);
            for (payload, mint) in payloads.iter().zip(&mints) {
                assert_eq!(payload.mint, *mint);
                assert!(payload.json.cached);
                assert_eq!(payload.json.metadata.name.as_deref(), Some("Cached"));

                let media = payload.media.as_ref().unwrap();
                assert!(media.cached);
                assert_eq!(media.bytes.as_ref(), &[0x89, b'P', b'N', b'G']);
                assert_eq!(media.path, dir.path().join(format!("{}.png", mint)));
            }
        }

        // Nothing new was written next to the seeded files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_json_only_skips_media() {
        let dir = TempDir::new().unwrap();
        let mint = Address::new([3u8; 32]);
        std::fs::write(
            dir.path().join(format!("{}.json", mint)),
            format!(r#"{{"image":"{}/missing.png"}}"#, UNREACHABLE),
        )
        .unwrap();
        let fetcher = MetadataFetcher::new(dir.path());

        let payloads = fetch_payloads(&fetcher, &sources(&[mint]), false, 1).await.unwrap();
        assert!(payloads[0].json.cached);
        assert!(payloads[0].media.is_none());

        // The media is not cached and its host is unreachable
        assert!(fetch_payloads(&fetcher, &sources(&[mint]), true, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_json_without_media_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mint = Address::new([4u8; 32]);
        std::fs::write(dir.path().join(format!("{}.json", mint)), r#"{"name":"Bare"}"#).unwrap();
        let fetcher = MetadataFetcher::new(dir.path());

        let err = fetch_payloads(&fetcher, &sources(&[mint]), true, 1).await.unwrap_err();
        assert!(err.to_string().contains("No media found"));
    }

    #[tokio::test]
    async fn test_uncached_json_needs_network() {
        let dir = TempDir::new().unwrap();
        let fetcher = MetadataFetcher::new(dir.path().join("fresh"));

        let result = fetch_payloads(&fetcher, &sources(&[Address::new([5u8; 32])]), true, 1).await;
        assert!(result.is_err());
    }
}
