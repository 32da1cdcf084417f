//! Inscribe Commands
//!
//! `file` writes a local file into an existing inscription account.
//! `nft` inscribes an NFT's JSON and media, creating the mint inscription and
//! its `image` associated inscription first when they are missing.

use super::download::{fetch_payloads, fetch_tokens, print_summary};
use super::{parse_mints, GlobalOptions};
use crate::config::InscribeConfig;
use crate::metadata::MetadataFetcher;
use crate::ui::{self, format_bytes, CHECK, HLINE, INFO};
use anyhow::{Context, Result};
use bytes::Bytes;
use console::style;
use futures::stream::{self, StreamExt, TryStreamExt};
use inscribe_core::{Address, InscriptionTarget};
use inscribe_engine::{
    CancellationToken, DriverConfig, InscribeReport, InscriptionDriver, ShardAllocator,
};
use inscribe_ledger::{InscriptionLedger, MemoryLedger, SolanaLedger};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Tag of the inscription that holds an NFT's media
const IMAGE_TAG: &str = "image";

/// File inscription configuration
pub struct FileConfig {
    pub account: String,
    pub path: PathBuf,
    pub tag: Option<String>,
    pub metadata_account: Option<String>,
    pub dry_run: bool,
}

/// NFT inscription configuration
pub struct NftConfig {
    pub mints: Vec<String>,
    pub skip_json: bool,
    pub skip_media: bool,
    pub cache_dir: Option<PathBuf>,
    pub yes: bool,
}

/// Run `inscribe file`
pub async fn file(
    options: &GlobalOptions,
    cfg: &InscribeConfig,
    config: FileConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let payload = tokio::fs::read(&config.path)
        .await
        .with_context(|| format!("Failed to read {}", config.path.display()))?;
    let payload = Bytes::from(payload);

    let account: Address = config.account.parse().context("Invalid account address")?;
    let metadata_account: Option<Address> = config
        .metadata_account
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("Invalid metadata account address")?;

    let driver_config = options.driver_config(cfg);

    if config.dry_run {
        return dry_run(
            account,
            metadata_account,
            config.tag.as_deref(),
            payload,
            driver_config,
        )
        .await;
    }

    let ledger = options.connect(cfg)?;
    let base = match metadata_account {
        Some(metadata) => InscriptionTarget::new(account, metadata),
        None => ledger.account_target(&account),
    };
    let target = match config.tag.as_deref() {
        Some(tag) => ledger.associated_target(&base, tag)?,
        None => base,
    };

    if !ledger.account_exists(&target.account).await? {
        anyhow::bail!(
            "Inscription account {} does not exist. Initialize it before inscribing.",
            target.account
        );
    }

    println!(
        "{} Inscribing {} ({}) into {}",
        style(INFO).blue(),
        config.path.display(),
        format_bytes(payload.len()),
        style(target.account).cyan()
    );

    if ledger.account_valid(&target.account, &payload).await? {
        println!("{} Already inscribed.", style(CHECK).green());
    } else {
        let report = run_inscription(ledger.clone(), driver_config, cancel, &target, payload)
            .await?;
        print_report(&report);
    }

    println!(
        "  Viewable at {}",
        ui::gateway_url(&ledger.config().rpc_url, &target.account)
    );
    Ok(())
}

/// Inscribe into a fresh in-memory ledger and report the remote calls needed
async fn dry_run(
    account: Address,
    metadata_account: Option<Address>,
    tag: Option<&str>,
    payload: Bytes,
    driver_config: DriverConfig,
) -> Result<()> {
    let metadata_account = metadata_account.unwrap_or_default();
    let target = match tag {
        Some(tag) => InscriptionTarget::associated(account, metadata_account, tag)?,
        None => InscriptionTarget::new(account, metadata_account),
    };

    let ledger = Arc::new(MemoryLedger::with_grow_increment(driver_config.grow_increment));
    ledger.initialize(&target);

    let driver = InscriptionDriver::new(ledger.clone(), driver_config)?;
    let report = driver.inscribe(&target, payload).await?;
    let stats = ledger.stats();

    println!();
    println!("{}", style("Dry run").bold().underlined());
    println!("{}", HLINE);
    println!("  Payload:        {}", format_bytes(report.payload_len));
    println!("  Allocate calls: {}", stats.grows);
    println!("  Write calls:    {}", stats.writes);
    println!("  Transactions:   {}", stats.grows + stats.writes);
    println!("  Peak in flight: {}", stats.peak_in_flight);
    Ok(())
}

/// Run `inscribe nft`
pub async fn nft(
    options: &GlobalOptions,
    cfg: &InscribeConfig,
    config: NftConfig,
    cancel: CancellationToken,
) -> Result<()> {
    if config.skip_json && config.skip_media {
        anyhow::bail!("Nothing to inscribe: both --skip-json and --skip-media are set");
    }

    let mints = parse_mints(&config.mints)?;

    let ledger = options.connect(cfg)?;
    let driver_config = options.driver_config(cfg);
    let concurrency = driver_config.concurrency;

    println!("{} Fetching {} NFTs...", style(INFO).blue(), mints.len());
    let tokens = fetch_tokens(&ledger, &mints, concurrency).await?;

    let payer = ledger.payer();
    if let Some((mint, _)) = mints
        .iter()
        .zip(&tokens)
        .find(|(_, token)| token.update_authority != payer)
    {
        anyhow::bail!("{} is not the update authority of {}", payer, mint);
    }

    let fetcher = MetadataFetcher::new(
        config
            .cache_dir
            .clone()
            .unwrap_or_else(|| cfg.inscribe.cache_dir.clone()),
    );

    // Media selection needs the JSON even when it is not inscribed
    let sources: Vec<(Address, String)> = mints
        .iter()
        .zip(tokens)
        .map(|(mint, token)| (*mint, token.uri))
        .collect();
    let payloads = fetch_payloads(&fetcher, &sources, !config.skip_media, concurrency).await?;
    print_summary(&payloads);

    if !config.yes && !confirm(&format!("Inscribe {} NFTs?", mints.len()))? {
        println!("Aborting...");
        return Ok(());
    }

    println!(
        "{} Initializing {} inscription JSON accounts...",
        style(INFO).blue(),
        mints.len()
    );
    let allocator = ShardAllocator::new(ledger.clone());
    let targets: Vec<InscriptionTarget> = stream::iter(&mints)
        .map(|mint| ensure_mint_inscription(&ledger, &allocator, mint))
        .buffered(concurrency)
        .try_collect()
        .await?;

    let image_targets: Vec<InscriptionTarget> = if config.skip_media {
        Vec::new()
    } else {
        println!(
            "{} Initializing {} inscription image accounts...",
            style(INFO).blue(),
            targets.len()
        );
        stream::iter(&targets)
            .map(|target| ensure_associated_inscription(&ledger, target, IMAGE_TAG))
            .buffered(concurrency)
            .try_collect()
            .await?
    };

    let rpc_url = ledger.config().rpc_url.clone();

    if !config.skip_json {
        for (target, payload) in targets.iter().zip(&payloads) {
            let json = &payload.json;
            let label = match json.metadata.name.as_deref() {
                Some(name) => format!("JSON of {}", name),
                None => "JSON".to_string(),
            };
            inscribe_payload(&ledger, &driver_config, &cancel, target, &json.bytes, &label)
                .await?;
            println!(
                "  JSON inscription viewable at {}",
                ui::gateway_url(&rpc_url, &target.account)
            );
        }
    }

    let media = payloads.iter().filter_map(|payload| payload.media.as_ref());
    for (target, file) in image_targets.iter().zip(media) {
        inscribe_payload(&ledger, &driver_config, &cancel, target, &file.bytes, "Image").await?;
        println!(
            "  Image inscription viewable at {}",
            ui::gateway_url(&rpc_url, &target.account)
        );
    }

    println!();
    println!("{} Done.", style(CHECK).green());
    Ok(())
}

/// Mint inscription target, created through a random shard if missing
async fn ensure_mint_inscription(
    ledger: &Arc<SolanaLedger>,
    allocator: &ShardAllocator,
    mint: &Address,
) -> Result<InscriptionTarget> {
    let target = ledger.mint_target(mint);
    if ledger.account_exists(&target.account).await? {
        return Ok(target);
    }

    let shard = allocator.ensure_shard(None).await?;
    info!(mint = %mint, shard = shard.number, "Initializing mint inscription");
    ledger
        .initialize_from_mint(mint, shard.number)
        .await
        .with_context(|| format!("Failed to initialize inscription for {}", mint))
}

/// Associated inscription target, created if missing
async fn ensure_associated_inscription(
    ledger: &Arc<SolanaLedger>,
    base: &InscriptionTarget,
    tag: &str,
) -> Result<InscriptionTarget> {
    let target = ledger.associated_target(base, tag)?;
    if ledger.account_exists(&target.account).await? {
        return Ok(target);
    }

    ledger
        .initialize_associated_inscription(base, tag)
        .await
        .with_context(|| format!("Failed to initialize {} inscription for {}", tag, base.account))
}

/// Inscribe one payload unless the account already holds it
async fn inscribe_payload(
    ledger: &Arc<SolanaLedger>,
    driver_config: &DriverConfig,
    cancel: &CancellationToken,
    target: &InscriptionTarget,
    payload: &Bytes,
    label: &str,
) -> Result<()> {
    if ledger.account_valid(&target.account, payload).await? {
        println!("{} {} already inscribed.", style(CHECK).green(), label);
        return Ok(());
    }

    println!("{} Inscribing {}...", style(INFO).blue(), label);
    let report = run_inscription(
        ledger.clone(),
        driver_config.clone(),
        cancel.clone(),
        target,
        payload.clone(),
    )
    .await?;
    print_report(&report);
    Ok(())
}

/// Drive one inscription with a progress bar attached
async fn run_inscription(
    ledger: Arc<dyn InscriptionLedger>,
    driver_config: DriverConfig,
    cancel: CancellationToken,
    target: &InscriptionTarget,
    payload: Bytes,
) -> Result<InscribeReport> {
    let (driver, events) = InscriptionDriver::with_progress(ledger, driver_config)?;
    let driver = driver.with_cancellation(cancel);
    let renderer = ui::spawn_progress(events)?;

    let result = driver.inscribe(target, payload).await;

    // Closes the progress channel so the renderer exits
    drop(driver);
    renderer.await.ok();

    result.with_context(|| format!("Failed to inscribe {}", target.account))
}

fn print_report(report: &InscribeReport) {
    println!(
        "{} Inscribed {} in {:.1?}",
        style(CHECK).green(),
        format_bytes(report.payload_len),
        report.duration
    );
    println!(
        "  {} allocations ({} failed), {} chunks written, {} retries, {} rounds",
        report.grow_calls,
        report.grow_failures,
        report.chunks_written,
        report.write_retries,
        report.rounds
    );
}

/// Ask a yes/no question on stdin
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
