//! Account layouts of the inscription and token metadata programs

use crate::ledger::ShardInfo;
use borsh::BorshDeserialize;
use inscribe_core::{InscribeError, Result};
use serde::{Deserialize, Serialize};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::pubkey::Pubkey;

/// Account discriminator byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub enum AccountKey {
    Uninitialized,
    InscriptionMetadataAccount,
    MintInscriptionMetadataAccount,
    InscriptionShardAccount,
}

/// Content type recorded for an inscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub enum DataType {
    Uninitialized,
    Binary,
    Json,
}

/// Entry for a tagged sub-inscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedInscription {
    pub tag: String,
    pub bump: u8,
    pub data_type: DataType,
}

/// Inscription metadata account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionMetadata {
    pub key: AccountKey,
    pub inscription_account: Pubkey,
    pub bump: u8,
    pub data_type: DataType,
    pub inscription_rank: u64,
    pub inscription_bump: Option<u8>,
    pub update_authorities: Vec<Pubkey>,
    pub associated_inscriptions: Vec<AssociatedInscription>,
    pub mint: Option<Pubkey>,
}

impl InscriptionMetadata {
    /// Byte offset of `inscription_rank` in the account data
    pub const RANK_OFFSET: usize = 1 + 32 + 1 + 1;

    /// Whether `signer` may write to this inscription
    pub fn is_authority(&self, signer: &Pubkey) -> bool {
        self.update_authorities.contains(signer)
    }

    /// Bump of an associated inscription, if the tag is registered
    pub fn associated_bump(&self, tag: &str) -> Option<u8> {
        self.associated_inscriptions
            .iter()
            .find(|entry| entry.tag == tag)
            .map(|entry| entry.bump)
    }
}

// Wire layouts. Keys are read as raw arrays and converted afterwards.

#[derive(BorshDeserialize)]
struct MetadataLayout {
    key: AccountKey,
    inscription_account: [u8; 32],
    bump: u8,
    data_type: DataType,
    inscription_rank: u64,
    inscription_bump: Option<u8>,
    update_authorities: Vec<[u8; 32]>,
    associated_inscriptions: Vec<AssociatedInscription>,
    mint: Option<[u8; 32]>,
}

#[derive(BorshDeserialize)]
struct ShardLayout {
    key: AccountKey,
    _bump: u8,
    shard_number: u8,
    count: u64,
}

#[derive(BorshDeserialize)]
struct TokenMetadataLayout {
    _key: u8,
    update_authority: [u8; 32],
    mint: [u8; 32],
    name: String,
    symbol: String,
    uri: String,
}

/// Decode the leading fields of `data`; accounts carry trailing padding.
fn decode<T: BorshDeserialize>(data: &[u8], kind: &str) -> Result<T> {
    let mut rest = data;
    T::deserialize(&mut rest)
        .map_err(|e| InscribeError::Serialization(format!("invalid {} account: {}", kind, e)))
}

/// Decode a shard counter account
pub fn decode_shard(data: &[u8]) -> Result<ShardInfo> {
    let layout: ShardLayout = decode(data, "shard")?;
    if layout.key != AccountKey::InscriptionShardAccount {
        return Err(InscribeError::Serialization(format!(
            "expected shard account, found {:?}",
            layout.key
        )));
    }
    Ok(ShardInfo {
        shard_number: layout.shard_number,
        count: layout.count,
    })
}

/// Decode an inscription metadata account
pub fn decode_metadata(data: &[u8]) -> Result<InscriptionMetadata> {
    let layout: MetadataLayout = decode(data, "inscription metadata")?;
    Ok(InscriptionMetadata {
        key: layout.key,
        inscription_account: Pubkey::new_from_array(layout.inscription_account),
        bump: layout.bump,
        data_type: layout.data_type,
        inscription_rank: layout.inscription_rank,
        inscription_bump: layout.inscription_bump,
        update_authorities: layout
            .update_authorities
            .into_iter()
            .map(Pubkey::new_from_array)
            .collect(),
        associated_inscriptions: layout.associated_inscriptions,
        mint: layout.mint.map(Pubkey::new_from_array),
    })
}

/// Program account filters selecting metadata accounts of `key` at `rank`
pub fn rank_filters(key: AccountKey, rank: u64) -> Vec<RpcFilterType> {
    vec![
        RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, vec![key as u8])),
        RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
            InscriptionMetadata::RANK_OFFSET,
            rank.to_le_bytes().to_vec(),
        )),
    ]
}

/// Leading fields of a token metadata account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    /// Off-chain JSON URI
    pub uri: String,
}

/// Decode the leading fields of a token metadata account.
///
/// Strings are stored zero-padded; the padding is stripped.
pub fn decode_token_metadata(data: &[u8]) -> Result<TokenMetadata> {
    let layout: TokenMetadataLayout = decode(data, "token metadata")?;
    let unpad = |value: String| value.trim_end_matches('\0').to_string();

    Ok(TokenMetadata {
        update_authority: Pubkey::new_from_array(layout.update_authority),
        mint: Pubkey::new_from_array(layout.mint),
        name: unpad(layout.name),
        symbol: unpad(layout.symbol),
        uri: unpad(layout.uri),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_string(data: &mut Vec<u8>, value: &str) {
        data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        data.extend_from_slice(value.as_bytes());
    }

    #[test]
    fn test_decode_shard() {
        let mut data = vec![3, 254, 12];
        data.extend_from_slice(&41u64.to_le_bytes());

        let shard = decode_shard(&data).unwrap();
        assert_eq!(shard.shard_number, 12);
        assert_eq!(shard.count, 41);
        assert_eq!(shard.real_count(), 41 * 32 + 12);

        data[0] = 1;
        assert!(decode_shard(&data).is_err());
        assert!(decode_shard(&data[..5]).is_err());
    }

    #[test]
    fn test_decode_metadata() {
        let account = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let mut data = vec![2];
        data.extend_from_slice(account.as_ref());
        data.extend_from_slice(&[255, 1]);
        data.extend_from_slice(&77u64.to_le_bytes());
        data.extend_from_slice(&[1, 253]);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(authority.as_ref());
        data.extend_from_slice(&1u32.to_le_bytes());
        put_string(&mut data, "image");
        data.extend_from_slice(&[250, 1]);
        data.push(1);
        data.extend_from_slice(mint.as_ref());
        data.extend_from_slice(&[0u8; 7]);

        let metadata = decode_metadata(&data).unwrap();
        assert_eq!(metadata.key, AccountKey::MintInscriptionMetadataAccount);
        assert_eq!(metadata.inscription_account, account);
        assert_eq!(metadata.data_type, DataType::Binary);
        assert_eq!(metadata.inscription_rank, 77);
        assert_eq!(metadata.inscription_bump, Some(253));
        assert!(metadata.is_authority(&authority));
        assert!(!metadata.is_authority(&mint));
        assert_eq!(metadata.associated_bump("image"), Some(250));
        assert_eq!(metadata.associated_bump("json"), None);
        assert_eq!(metadata.mint, Some(mint));
        assert_eq!(
            data[InscriptionMetadata::RANK_OFFSET..InscriptionMetadata::RANK_OFFSET + 8],
            77u64.to_le_bytes()
        );

        data[0] = 9;
        assert!(matches!(
            decode_metadata(&data),
            Err(InscribeError::Serialization(_))
        ));
        assert!(decode_metadata(&data[..40]).is_err());
    }

    fn memcmp_matches(filters: &[RpcFilterType], data: &[u8]) -> bool {
        filters.iter().all(|filter| match filter {
            RpcFilterType::Memcmp(memcmp) => memcmp.bytes_match(data),
            _ => false,
        })
    }

    #[test]
    fn test_rank_filters() {
        let mut data = vec![AccountKey::MintInscriptionMetadataAccount as u8];
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        data.extend_from_slice(&[254, 1]);
        data.extend_from_slice(&300u64.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

        let filters = rank_filters(AccountKey::MintInscriptionMetadataAccount, 300);
        assert_eq!(filters.len(), 2);
        assert!(memcmp_matches(&filters, &data));

        assert!(!memcmp_matches(
            &rank_filters(AccountKey::MintInscriptionMetadataAccount, 301),
            &data
        ));
        assert!(!memcmp_matches(
            &rank_filters(AccountKey::InscriptionMetadataAccount, 300),
            &data
        ));

        // Rank 300 spans two bytes; a match one byte early must not count.
        let mut shifted = data.clone();
        shifted.remove(1);
        assert!(!memcmp_matches(&filters, &shifted));
    }

    #[test]
    fn test_decode_token_metadata() {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let mut data = vec![4];
        data.extend_from_slice(authority.as_ref());
        data.extend_from_slice(mint.as_ref());
        put_string(&mut data, "Name\0\0\0");
        put_string(&mut data, "SYM");
        put_string(&mut data, "https://example.com/1.json\0\0\0\0");
        data.extend_from_slice(&[0u8; 16]);

        let metadata = decode_token_metadata(&data).unwrap();
        assert_eq!(metadata.update_authority, authority);
        assert_eq!(metadata.mint, mint);
        assert_eq!(metadata.name, "Name");
        assert_eq!(metadata.uri, "https://example.com/1.json");
    }
}
