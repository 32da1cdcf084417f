//! Fetch Commands
//!
//! Dumps inscription metadata as JSON, ordered by rank. `mint` looks
//! inscriptions up by mint address; `rank` scans the program's metadata
//! accounts for the given inscription ranks.

use super::{parse_mints, write_json};
use crate::ui::{CHECK, WARN};
use anyhow::{Context, Result};
use console::style;
use futures::stream::{self, StreamExt, TryStreamExt};
use inscribe_core::Address;
use inscribe_ledger::solana::{to_address, AssociatedInscription, DataType, InscriptionMetadata};
use inscribe_ledger::SolanaLedger;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Mint fetch configuration
pub struct MintConfig {
    pub mints: Vec<String>,
    pub output: Option<PathBuf>,
    pub concurrency: usize,
}

/// Rank fetch configuration
pub struct RankConfig {
    pub ranks: Vec<u64>,
    pub output: Option<PathBuf>,
    pub concurrency: usize,
}

/// Inscription metadata of one inscription
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionRecord {
    /// Owning mint; absent for inscriptions not created from a mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<Address>,
    pub inscription_account: Address,
    pub metadata_account: Address,
    pub inscription_rank: u64,
    pub data_type: DataType,
    pub update_authorities: Vec<Address>,
    pub associated_inscriptions: Vec<AssociatedInscription>,
}

impl InscriptionRecord {
    fn new(metadata_account: Address, metadata: InscriptionMetadata) -> Self {
        Self {
            mint: metadata.mint.as_ref().map(to_address),
            inscription_account: to_address(&metadata.inscription_account),
            metadata_account,
            inscription_rank: metadata.inscription_rank,
            data_type: metadata.data_type,
            update_authorities: metadata.update_authorities.iter().map(to_address).collect(),
            associated_inscriptions: metadata.associated_inscriptions,
        }
    }
}

/// Run `fetch mint`
pub async fn mint(ledger: Arc<SolanaLedger>, config: MintConfig) -> Result<()> {
    let mints = parse_mints(&config.mints)?;

    let fetched: Vec<(Address, Option<InscriptionRecord>)> = stream::iter(mints)
        .map(|mint| {
            let ledger = ledger.clone();
            async move {
                let target = ledger.mint_target(&mint);
                let metadata = ledger
                    .fetch_inscription_metadata(&target.metadata_account)
                    .await
                    .with_context(|| format!("Failed to fetch inscription of {}", mint))?;
                Ok::<_, anyhow::Error>((
                    mint,
                    metadata.map(|m| InscriptionRecord {
                        mint: Some(mint),
                        ..InscriptionRecord::new(target.metadata_account, m)
                    }),
                ))
            }
        })
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    let mut records = Vec::with_capacity(fetched.len());
    for (mint, record) in fetched {
        match record {
            Some(record) => records.push(record),
            None => eprintln!("{} {} has no inscription", style(WARN).yellow(), mint),
        }
    }
    finish(records, config.output)
}

/// Run `fetch rank`
pub async fn rank(ledger: Arc<SolanaLedger>, config: RankConfig) -> Result<()> {
    if config.ranks.is_empty() {
        anyhow::bail!("No ranks given");
    }

    let records: Vec<InscriptionRecord> = stream::iter(config.ranks)
        .map(|rank| {
            let ledger = ledger.clone();
            async move {
                let found = ledger
                    .fetch_inscriptions_by_rank(rank)
                    .await
                    .with_context(|| format!("Failed to scan for rank {}", rank))?;
                single_rank(rank, found)
            }
        })
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    finish(records, config.output)
}

/// The one inscription holding `rank`
fn single_rank(rank: u64, found: Vec<(Address, InscriptionMetadata)>) -> Result<InscriptionRecord> {
    let count = found.len();
    match found.into_iter().next() {
        None => anyhow::bail!("No inscription metadata found for rank {}", rank),
        Some(_) if count > 1 => {
            anyhow::bail!("{} inscriptions share rank {}; ranks should be unique", count, rank)
        }
        Some((metadata_account, metadata)) => {
            Ok(InscriptionRecord::new(metadata_account, metadata))
        }
    }
}

fn finish(mut records: Vec<InscriptionRecord>, output: Option<PathBuf>) -> Result<()> {
    sort_by_rank(&mut records);

    write_json(&records, output.as_deref())?;
    if let Some(path) = &output {
        println!(
            "{} Wrote {} inscriptions to {}",
            style(CHECK).green(),
            records.len(),
            path.display()
        );
    }
    Ok(())
}

fn sort_by_rank(records: &mut [InscriptionRecord]) {
    records.sort_by_key(|record| record.inscription_rank);
}

#[cfg(test)]
mod tests {
    use super::*;
    use inscribe_ledger::solana::{to_pubkey, AccountKey};

    fn record(rank: u64, seed: u8) -> InscriptionRecord {
        InscriptionRecord {
            mint: Some(Address::new([seed; 32])),
            inscription_account: Address::new([seed.wrapping_add(1); 32]),
            metadata_account: Address::new([seed.wrapping_add(2); 32]),
            inscription_rank: rank,
            data_type: DataType::Json,
            update_authorities: vec![Address::new([9u8; 32])],
            associated_inscriptions: vec![AssociatedInscription {
                tag: "image".to_string(),
                bump: 254,
                data_type: DataType::Binary,
            }],
        }
    }

    #[test]
    fn test_sorted_by_rank() {
        let mut records = vec![record(40, 1), record(3, 2), record(17, 3)];
        sort_by_rank(&mut records);
        let ranks: Vec<u64> = records.iter().map(|r| r.inscription_rank).collect();
        assert_eq!(ranks, vec![3, 17, 40]);
    }

    #[test]
    fn test_record_json() {
        let json = serde_json::to_value(record(5, 1)).unwrap();
        assert_eq!(json["inscriptionRank"], 5);
        assert_eq!(json["dataType"], "Json");
        assert_eq!(json["mint"], Address::new([1u8; 32]).to_string());
        assert_eq!(json["associatedInscriptions"][0]["tag"], "image");
        assert_eq!(json["associatedInscriptions"][0]["dataType"], "Binary");
    }

    fn metadata(rank: u64, mint: Option<Address>) -> InscriptionMetadata {
        InscriptionMetadata {
            key: if mint.is_some() {
                AccountKey::MintInscriptionMetadataAccount
            } else {
                AccountKey::InscriptionMetadataAccount
            },
            inscription_account: to_pubkey(&Address::new([21u8; 32])),
            bump: 255,
            data_type: DataType::Json,
            inscription_rank: rank,
            inscription_bump: Some(254),
            update_authorities: vec![to_pubkey(&Address::new([22u8; 32]))],
            associated_inscriptions: Vec::new(),
            mint: mint.as_ref().map(to_pubkey),
        }
    }

    #[test]
    fn test_single_rank() {
        let mint = Address::new([7u8; 32]);
        let metadata_account = Address::new([8u8; 32]);

        let record = single_rank(12, vec![(metadata_account, metadata(12, Some(mint)))]).unwrap();
        assert_eq!(record.inscription_rank, 12);
        assert_eq!(record.metadata_account, metadata_account);
        assert_eq!(record.mint, Some(mint));
        assert_eq!(record.inscription_account, Address::new([21u8; 32]));

        let err = single_rank(13, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("rank 13"));

        let duplicates = vec![
            (Address::new([1u8; 32]), metadata(14, None)),
            (Address::new([2u8; 32]), metadata(14, None)),
        ];
        let err = single_rank(14, duplicates).unwrap_err();
        assert!(err.to_string().contains("2 inscriptions share rank 14"));
    }

    #[test]
    fn test_plain_inscription_omits_mint() {
        let record = InscriptionRecord::new(Address::new([8u8; 32]), metadata(3, None));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("mint").is_none());
        assert_eq!(json["inscriptionRank"], 3);
    }
}
