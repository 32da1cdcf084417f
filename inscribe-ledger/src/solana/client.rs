//! Solana RPC ledger
//!
//! Implements [`InscriptionLedger`] against a deployed inscription program.
//! Every mutating call is a single signed transaction confirmed at the
//! configured commitment level.

use crate::ledger::{AccountSnapshot, InscriptionLedger, ShardInfo};
use async_trait::async_trait;
use bytes::Bytes;
use inscribe_core::address::validate_tag;
use inscribe_core::{Address, InscribeError, InscriptionTarget, Result};
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::instructions::{self, InscriptionAccounts, MintAccounts};
use super::pda;
use super::state::{self, rank_filters, AccountKey, InscriptionMetadata, TokenMetadata};
use super::types::{map_client_error, to_address, to_pubkey, LedgerConfig};

/// Inscription ledger backed by a Solana RPC node
pub struct SolanaLedger {
    /// Solana RPC client
    rpc_client: Arc<RpcClient>,

    /// Fee payer and write authority
    payer: Arc<Keypair>,

    /// Commitment used for reads and confirmations
    commitment: CommitmentConfig,

    /// Configuration
    config: LedgerConfig,
}

impl SolanaLedger {
    /// Create a new ledger client
    pub fn new(config: LedgerConfig, payer: Keypair) -> Result<Self> {
        let commitment = config.commitment_config()?;
        let rpc_client = Arc::new(RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            commitment,
        ));

        info!(
            rpc = %config.rpc_url,
            payer = %payer.pubkey(),
            program = %config.program_id,
            "Solana ledger initialized"
        );

        Ok(Self {
            rpc_client,
            payer: Arc::new(payer),
            commitment,
            config,
        })
    }

    /// Create a ledger client, loading the payer from the configured keypair path
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        let path = config.keypair_path.clone().ok_or_else(|| {
            InscribeError::Configuration("no keypair path configured".to_string())
        })?;
        let payer = load_keypair(&path)?;
        Self::new(config, payer)
    }

    /// Create a client for queries only.
    ///
    /// The payer is a fresh unfunded keypair; every transaction is rejected.
    pub fn read_only(config: LedgerConfig) -> Result<Self> {
        Self::new(config, Keypair::new())
    }

    /// Payer public key
    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Configuration reference
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn program_id(&self) -> &Pubkey {
        &self.config.program_id
    }

    /// Sign, send and confirm a single-instruction transaction
    async fn send(&self, instruction: Instruction, context: &str) -> Result<Signature> {
        let recent_blockhash = self
            .rpc_client
            .get_latest_blockhash()
            .await
            .map_err(|e| map_client_error(e, context))?;

        let payer = self.payer.pubkey();
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&payer),
            &[self.payer.as_ref()],
            recent_blockhash,
        );

        let signature = self
            .rpc_client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| map_client_error(e, context))?;

        debug!(signature = %signature, context, "Transaction confirmed");
        Ok(signature)
    }

    async fn raw_account(&self, pubkey: &Pubkey) -> Result<Option<solana_sdk::account::Account>> {
        let response = self
            .rpc_client
            .get_account_with_commitment(pubkey, self.commitment)
            .await
            .map_err(|e| map_client_error(e, &pubkey.to_string()))?;
        Ok(response.value)
    }

    // =========================================================================
    // ADDRESSING
    // =========================================================================

    /// Target of the inscription owned by a mint
    pub fn mint_target(&self, mint: &Address) -> InscriptionTarget {
        let (account, _) = pda::mint_inscription(self.program_id(), &to_pubkey(mint));
        let (metadata, _) = pda::inscription_metadata(self.program_id(), &account);
        InscriptionTarget::new(to_address(&account), to_address(&metadata))
    }

    /// Target of a tagged inscription associated with an existing one
    pub fn associated_target(
        &self,
        base: &InscriptionTarget,
        tag: &str,
    ) -> Result<InscriptionTarget> {
        validate_tag(tag)?;
        let (account, _) =
            pda::associated_inscription(self.program_id(), tag, &to_pubkey(&base.metadata_account));
        InscriptionTarget::associated(to_address(&account), base.metadata_account, tag)
    }

    /// Target of a plain inscription account
    pub fn account_target(&self, account: &Address) -> InscriptionTarget {
        let (metadata, _) = pda::inscription_metadata(self.program_id(), &to_pubkey(account));
        InscriptionTarget::new(*account, to_address(&metadata))
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Create the inscription account of a mint, ranked through `shard_number`
    pub async fn initialize_from_mint(
        &self,
        mint: &Address,
        shard_number: u8,
    ) -> Result<InscriptionTarget> {
        let target = self.mint_target(mint);
        let mint_key = to_pubkey(mint);
        let inscription = to_pubkey(&target.account);
        let metadata = to_pubkey(&target.metadata_account);
        let (token_metadata, _) = pda::token_metadata(&mint_key);
        let (shard, _) = pda::shard(self.program_id(), shard_number);
        let payer = self.payer.pubkey();

        let instruction = instructions::initialize_from_mint(
            self.program_id(),
            MintAccounts {
                mint_inscription_account: inscription,
                metadata_account: metadata,
                mint: mint_key,
                token_metadata_account: token_metadata,
                shard_account: shard,
                payer,
                authority: None,
            },
        );

        let signature = self
            .send(instruction, &target.account.to_string())
            .await?;
        info!(
            mint = %mint,
            inscription = %target.account,
            shard = shard_number,
            signature = %signature,
            "Mint inscription initialized"
        );
        Ok(target)
    }

    /// Create a tagged inscription associated with `base`
    pub async fn initialize_associated_inscription(
        &self,
        base: &InscriptionTarget,
        tag: &str,
    ) -> Result<InscriptionTarget> {
        let target = self.associated_target(base, tag)?;
        let payer = self.payer.pubkey();

        let instruction = instructions::initialize_associated_inscription(
            self.program_id(),
            &to_pubkey(&base.account),
            &to_pubkey(&base.metadata_account),
            &to_pubkey(&target.account),
            &payer,
            None,
            tag,
        )?;

        let signature = self
            .send(instruction, &target.account.to_string())
            .await?;
        info!(
            inscription = %target.account,
            tag,
            signature = %signature,
            "Associated inscription initialized"
        );
        Ok(target)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Read and decode an inscription metadata account
    pub async fn fetch_inscription_metadata(
        &self,
        metadata_account: &Address,
    ) -> Result<Option<InscriptionMetadata>> {
        match self.raw_account(&to_pubkey(metadata_account)).await? {
            Some(account) => state::decode_metadata(&account.data).map(Some),
            None => Ok(None),
        }
    }

    /// Read and decode a mint's token metadata account
    pub async fn fetch_token_metadata(&self, mint: &Address) -> Result<TokenMetadata> {
        let (token_metadata, _) = pda::token_metadata(&to_pubkey(mint));
        let account = self
            .raw_account(&token_metadata)
            .await?
            .ok_or_else(|| InscribeError::NotFound(token_metadata.to_string()))?;
        state::decode_token_metadata(&account.data)
    }

    /// Every metadata account holding `rank`, mint-owned or plain.
    ///
    /// Ranks are unique on-chain; more than one match is still returned so
    /// the caller can report it.
    pub async fn fetch_inscriptions_by_rank(
        &self,
        rank: u64,
    ) -> Result<Vec<(Address, InscriptionMetadata)>> {
        let mut found = Vec::new();
        for key in [
            AccountKey::MintInscriptionMetadataAccount,
            AccountKey::InscriptionMetadataAccount,
        ] {
            let config = RpcProgramAccountsConfig {
                filters: Some(rank_filters(key, rank)),
                account_config: RpcAccountInfoConfig {
                    encoding: Some(UiAccountEncoding::Base64),
                    commitment: Some(self.commitment),
                    ..RpcAccountInfoConfig::default()
                },
                ..RpcProgramAccountsConfig::default()
            };
            let accounts = self
                .rpc_client
                .get_program_accounts_with_config(self.program_id(), config)
                .await
                .map_err(|e| map_client_error(e, &format!("rank {}", rank)))?;

            debug!(rank, key = ?key, matches = accounts.len(), "Program accounts scanned");
            for (pubkey, account) in accounts {
                found.push((to_address(&pubkey), state::decode_metadata(&account.data)?));
            }
        }
        Ok(found)
    }

    fn inscription_accounts(&self, target: &InscriptionTarget) -> InscriptionAccounts {
        InscriptionAccounts {
            inscription_account: to_pubkey(&target.account),
            metadata_account: to_pubkey(&target.metadata_account),
            payer: self.payer.pubkey(),
            authority: None,
        }
    }
}

/// Load a keypair from a JSON byte-array file
pub fn load_keypair(path: impl AsRef<Path>) -> Result<Keypair> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(InscribeError::Configuration(format!(
            "Keypair file not found: {}",
            path.display()
        )));
    }

    let keypair_json = std::fs::read_to_string(path)?;
    let keypair_bytes: Vec<u8> = serde_json::from_str(&keypair_json).map_err(|e| {
        InscribeError::Configuration(format!("Failed to parse keypair JSON: {}", e))
    })?;
    #[allow(deprecated)]
    let keypair = Keypair::from_bytes(&keypair_bytes)
        .map_err(|e| InscribeError::Configuration(format!("Failed to parse keypair: {}", e)))?;

    info!(
        path = %path.display(),
        pubkey = %keypair.pubkey(),
        "Loaded payer keypair"
    );

    Ok(keypair)
}

#[async_trait]
impl InscriptionLedger for SolanaLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountSnapshot>> {
        Ok(self
            .raw_account(&to_pubkey(address))
            .await?
            .map(|account| AccountSnapshot {
                data: Bytes::from(account.data),
                owner: to_address(&account.owner),
            }))
    }

    async fn allocate(&self, target: &InscriptionTarget, target_size: usize) -> Result<()> {
        let accounts = self.inscription_accounts(target);
        let instruction =
            instructions::allocate(self.program_id(), accounts, target.tag(), target_size as u64)?;

        self.send(instruction, &target.account.to_string()).await?;
        Ok(())
    }

    async fn write_data(
        &self,
        target: &InscriptionTarget,
        offset: usize,
        data: Bytes,
    ) -> Result<()> {
        let accounts = self.inscription_accounts(target);
        let instruction = instructions::write_data(
            self.program_id(),
            accounts,
            target.tag(),
            offset as u64,
            &data,
        )?;

        self.send(instruction, &target.account.to_string()).await?;
        Ok(())
    }

    fn shard_address(&self, shard_number: u8) -> Address {
        to_address(&pda::shard(self.program_id(), shard_number).0)
    }

    async fn fetch_shard(&self, shard_number: u8) -> Result<Option<ShardInfo>> {
        let (shard, _) = pda::shard(self.program_id(), shard_number);
        match self.raw_account(&shard).await? {
            Some(account) => state::decode_shard(&account.data).map(Some),
            None => Ok(None),
        }
    }

    async fn create_shard(&self, shard_number: u8) -> Result<()> {
        let (shard, _) = pda::shard(self.program_id(), shard_number);
        let instruction = instructions::create_shard(
            self.program_id(),
            &shard,
            &self.payer.pubkey(),
            shard_number,
        )?;

        let signature = self.send(instruction, &shard.to_string()).await?;
        info!(shard = shard_number, signature = %signature, "Shard created");
        Ok(())
    }

    async fn verify_target(&self, target: &InscriptionTarget) -> Result<()> {
        let metadata = to_pubkey(&target.metadata_account);
        let expected = match target.tag() {
            Some(tag) => {
                validate_tag(tag)?;
                let (account, _) = pda::associated_inscription(self.program_id(), tag, &metadata);
                (to_address(&account), target.account)
            }
            None => {
                let (derived, _) =
                    pda::inscription_metadata(self.program_id(), &to_pubkey(&target.account));
                (to_address(&derived), target.metadata_account)
            }
        };

        if expected.0 != expected.1 {
            return Err(InscribeError::DerivationMismatch {
                address: expected.1.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_ledger() -> SolanaLedger {
        let config = LedgerConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            ..LedgerConfig::default()
        };
        SolanaLedger::new(config, Keypair::new()).unwrap()
    }

    #[tokio::test]
    async fn test_mint_target_verifies() {
        let ledger = offline_ledger();
        let mint = Address::new(Pubkey::new_unique().to_bytes());
        let target = ledger.mint_target(&mint);
        ledger.verify_target(&target).await.unwrap();

        let associated = ledger.associated_target(&target, "image").unwrap();
        ledger.verify_target(&associated).await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_target_rejected() {
        let ledger = offline_ledger();
        let mint = Address::new(Pubkey::new_unique().to_bytes());
        let mut target = ledger.mint_target(&mint);
        target.metadata_account = Address::new([3u8; 32]);

        assert!(matches!(
            ledger.verify_target(&target).await,
            Err(InscribeError::DerivationMismatch { .. })
        ));
    }

    #[test]
    fn test_associated_target_rejects_long_tag() {
        let ledger = offline_ledger();
        let base = ledger.account_target(&Address::new([5u8; 32]));
        assert!(matches!(
            ledger.associated_target(&base, &"x".repeat(33)),
            Err(InscribeError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_load_keypair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        std::fs::write(&path, json).unwrap();

        let loaded = load_keypair(&path).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            load_keypair(&path),
            Err(InscribeError::Configuration(_))
        ));
        assert!(matches!(
            load_keypair(dir.path().join("missing.json")),
            Err(InscribeError::Configuration(_))
        ));
    }
}
