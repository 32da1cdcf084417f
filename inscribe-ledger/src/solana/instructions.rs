//! Inscription program instruction builders
//!
//! Instruction data is the borsh encoding of the program's instruction enum:
//! a one-byte variant index followed by the variant's arguments.

use borsh::BorshSerialize;
use inscribe_core::{InscribeError, Result};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

/// Variant index of each program instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InscriptionInstruction {
    Initialize = 0,
    InitializeFromMint = 1,
    Close = 2,
    WriteData = 3,
    ClearData = 4,
    AddAuthority = 5,
    RemoveAuthority = 6,
    CreateShard = 7,
    InitializeAssociatedInscription = 8,
    Allocate = 9,
    Delegate = 10,
}

#[derive(BorshSerialize)]
struct WriteDataArgs<'a> {
    associated_tag: Option<&'a str>,
    offset: u64,
    value: &'a [u8],
}

#[derive(BorshSerialize)]
struct AllocateArgs<'a> {
    associated_tag: Option<&'a str>,
    target_size: u64,
}

#[derive(BorshSerialize)]
struct AssociateArgs<'a> {
    association_tag: &'a str,
}

#[derive(BorshSerialize)]
struct CreateShardArgs {
    shard_number: u8,
}

/// Variant index followed by the borsh-encoded arguments
fn instruction_data(
    variant: InscriptionInstruction,
    args: &impl BorshSerialize,
) -> Result<Vec<u8>> {
    let mut data = vec![variant as u8];
    args.serialize(&mut data).map_err(|e| {
        InscribeError::Serialization(format!("{:?} arguments: {}", variant, e))
    })?;
    Ok(data)
}

/// Optional authority: the program ID stands in for "none"
fn authority_meta(program_id: &Pubkey, authority: Option<Pubkey>) -> AccountMeta {
    match authority {
        Some(authority) => AccountMeta::new_readonly(authority, true),
        None => AccountMeta::new_readonly(*program_id, false),
    }
}

/// Accounts addressed by a write or allocate
#[derive(Debug, Clone, Copy)]
pub struct InscriptionAccounts {
    pub inscription_account: Pubkey,
    pub metadata_account: Pubkey,
    pub payer: Pubkey,
    pub authority: Option<Pubkey>,
}

impl InscriptionAccounts {
    fn metas(&self, program_id: &Pubkey) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.inscription_account, false),
            AccountMeta::new(self.metadata_account, false),
            AccountMeta::new(self.payer, true),
            authority_meta(program_id, self.authority),
            AccountMeta::new_readonly(system_program::id(), false),
        ]
    }
}

/// Write `value` into an inscription account at `offset`
pub fn write_data(
    program_id: &Pubkey,
    accounts: InscriptionAccounts,
    associated_tag: Option<&str>,
    offset: u64,
    value: &[u8],
) -> Result<Instruction> {
    let data = instruction_data(
        InscriptionInstruction::WriteData,
        &WriteDataArgs {
            associated_tag,
            offset,
            value,
        },
    )?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: accounts.metas(program_id),
        data,
    })
}

/// Grow an inscription account toward `target_size`
pub fn allocate(
    program_id: &Pubkey,
    accounts: InscriptionAccounts,
    associated_tag: Option<&str>,
    target_size: u64,
) -> Result<Instruction> {
    let data = instruction_data(
        InscriptionInstruction::Allocate,
        &AllocateArgs {
            associated_tag,
            target_size,
        },
    )?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: accounts.metas(program_id),
        data,
    })
}

/// Create a shard counter account
pub fn create_shard(
    program_id: &Pubkey,
    shard_account: &Pubkey,
    payer: &Pubkey,
    shard_number: u8,
) -> Result<Instruction> {
    let data = instruction_data(
        InscriptionInstruction::CreateShard,
        &CreateShardArgs { shard_number },
    )?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*shard_account, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Accounts for initializing a mint inscription
#[derive(Debug, Clone, Copy)]
pub struct MintAccounts {
    pub mint_inscription_account: Pubkey,
    pub metadata_account: Pubkey,
    pub mint: Pubkey,
    pub token_metadata_account: Pubkey,
    pub shard_account: Pubkey,
    pub payer: Pubkey,
    pub authority: Option<Pubkey>,
}

/// Initialize the inscription account of a mint
pub fn initialize_from_mint(program_id: &Pubkey, accounts: MintAccounts) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(accounts.mint_inscription_account, false),
            AccountMeta::new(accounts.metadata_account, false),
            AccountMeta::new_readonly(accounts.mint, false),
            AccountMeta::new_readonly(accounts.token_metadata_account, false),
            AccountMeta::new(accounts.shard_account, false),
            AccountMeta::new(accounts.payer, true),
            authority_meta(program_id, accounts.authority),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: vec![InscriptionInstruction::InitializeFromMint as u8],
    }
}

/// Initialize an associated inscription account under a tag
pub fn initialize_associated_inscription(
    program_id: &Pubkey,
    inscription_account: &Pubkey,
    metadata_account: &Pubkey,
    associated_account: &Pubkey,
    payer: &Pubkey,
    authority: Option<Pubkey>,
    tag: &str,
) -> Result<Instruction> {
    let data = instruction_data(
        InscriptionInstruction::InitializeAssociatedInscription,
        &AssociateArgs {
            association_tag: tag,
        },
    )?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*inscription_account, false),
            AccountMeta::new(*metadata_account, false),
            AccountMeta::new(*associated_account, false),
            AccountMeta::new(*payer, true),
            authority_meta(program_id, authority),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::types::constants::PROGRAM_ID;

    fn accounts(keys: &[Pubkey; 3], authority: Option<Pubkey>) -> InscriptionAccounts {
        InscriptionAccounts {
            inscription_account: keys[0],
            metadata_account: keys[1],
            payer: keys[2],
            authority,
        }
    }

    #[test]
    fn test_write_data_encoding() {
        let keys = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let ix = write_data(&PROGRAM_ID, accounts(&keys, None), None, 500, &[7, 8, 9]).unwrap();

        assert_eq!(
            ix.data,
            vec![3, 0, 0xf4, 0x01, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 7, 8, 9]
        );
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(ix.accounts[3].pubkey, PROGRAM_ID);
        assert!(!ix.accounts[3].is_signer);
    }

    #[test]
    fn test_tagged_allocate_encoding() {
        let keys = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let authority = Pubkey::new_unique();
        let ix = allocate(
            &PROGRAM_ID,
            accounts(&keys, Some(authority)),
            Some("img"),
            10_240,
        )
        .unwrap();

        let mut expected = vec![9, 1, 3, 0, 0, 0, b'i', b'm', b'g'];
        expected.extend_from_slice(&10_240u64.to_le_bytes());
        assert_eq!(ix.data, expected);
        assert_eq!(ix.accounts[3].pubkey, authority);
        assert!(ix.accounts[3].is_signer);
    }

    #[test]
    fn test_create_shard_encoding() {
        let shard = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let ix = create_shard(&PROGRAM_ID, &shard, &payer, 31).unwrap();
        assert_eq!(ix.data, vec![7, 31]);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[2].pubkey, system_program::id());
    }

    #[test]
    fn test_associated_encoding() {
        let keys = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let payer = Pubkey::new_unique();
        let ix = initialize_associated_inscription(
            &PROGRAM_ID, &keys[0], &keys[1], &keys[2], &payer, None, "image",
        )
        .unwrap();
        assert_eq!(ix.data, vec![8, 5, 0, 0, 0, b'i', b'm', b'a', b'g', b'e']);
        assert!(!ix.accounts[0].is_writable);
        assert_eq!(ix.accounts.len(), 6);
    }
}
