//! Console output: cross-platform status symbols and the driver progress bar

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inscribe_core::Address;
use inscribe_engine::ProgressEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Checkmark symbol
#[cfg(windows)]
pub const CHECK: &str = "[OK]";
#[cfg(not(windows))]
pub const CHECK: &str = "\u{2713}"; // ✓

/// Cross/error symbol
#[cfg(windows)]
pub const CROSS: &str = "[X]";
#[cfg(not(windows))]
pub const CROSS: &str = "\u{2717}"; // ✗

/// Warning symbol
#[cfg(windows)]
pub const WARN: &str = "[!]";
#[cfg(not(windows))]
pub const WARN: &str = "!";

/// Info symbol
#[cfg(windows)]
pub const INFO: &str = "[*]";
#[cfg(not(windows))]
pub const INFO: &str = "*";

/// Horizontal line (for headers)
#[cfg(windows)]
pub const HLINE: &str = "------------";
#[cfg(not(windows))]
pub const HLINE: &str = "\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}"; // ────────────

/// Inscription gateway that renders inscribed accounts
pub const INSCRIPTION_GATEWAY: &str = "https://igw.metaplex.com";

/// Gateway link for an inscribed account on the cluster behind `rpc_url`
pub fn gateway_url(rpc_url: &str, account: &Address) -> String {
    let network = if rpc_url.contains("devnet") {
        "devnet"
    } else if rpc_url.contains("testnet") {
        "testnet"
    } else {
        "mainnet"
    };
    format!("{}/{}/{}", INSCRIPTION_GATEWAY, network, account)
}

/// Human-readable byte count
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn chunk_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")?
        .progress_chars("#>-"))
}

/// Render driver progress events until the driver drops its sender.
///
/// One bar per account; a new account finishes the previous bar.
pub fn spawn_progress(mut events: mpsc::Receiver<ProgressEvent>) -> Result<JoinHandle<()>> {
    let style = chunk_style()?;

    Ok(tokio::spawn(async move {
        let mut current: Option<(Address, ProgressBar)> = None;

        while let Some(event) = events.recv().await {
            let account = *event.account();
            let bar = match &current {
                Some((active, bar)) if *active == account => bar.clone(),
                _ => {
                    if let Some((_, previous)) = current.take() {
                        previous.finish_and_clear();
                    }
                    let bar = ProgressBar::new(0).with_style(style.clone());
                    current = Some((account, bar.clone()));
                    bar
                }
            };

            match event {
                ProgressEvent::Sizing {
                    current: length,
                    target,
                    grows,
                    ..
                } => bar.set_message(format!(
                    "sizing {} -> {} ({} allocations)",
                    format_bytes(length),
                    format_bytes(target),
                    grows
                )),
                ProgressEvent::Allocated { length, target, .. } => bar.set_message(format!(
                    "allocated {}/{}",
                    format_bytes(length.min(target)),
                    format_bytes(target)
                )),
                ProgressEvent::Writing { pending, total, .. } => {
                    bar.set_length(total as u64);
                    bar.set_position(total.saturating_sub(pending) as u64);
                    bar.set_message(format!("writing {} chunks", pending));
                }
                ProgressEvent::ChunkWritten { .. } => bar.inc(1),
                ProgressEvent::Retrying {
                    offset,
                    attempt,
                    error,
                    ..
                } => bar.println(format!(
                    "{} retrying offset {} (attempt {}): {}",
                    console::style(WARN).yellow(),
                    offset,
                    attempt,
                    error
                )),
                ProgressEvent::Verifying { round, .. } => {
                    bar.set_message(format!("verifying (round {})", round))
                }
                ProgressEvent::Converged { bytes, .. } => {
                    bar.set_position(bar.length().unwrap_or(0));
                    bar.finish_with_message(format!("{} inscribed", format_bytes(bytes)));
                    current = None;
                }
            }
        }

        if let Some((_, bar)) = current {
            bar.abandon();
        }
    }))
}
