//! Program-derived addresses used by the inscription program

use super::types::constants::{
    ASSOCIATION, METADATA_PREFIX, PREFIX, SHARD_PREFIX, TOKEN_METADATA_PROGRAM_ID,
};
use solana_sdk::pubkey::Pubkey;

/// Metadata account of an inscription account
pub fn inscription_metadata(program_id: &Pubkey, inscription_account: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[PREFIX, program_id.as_ref(), inscription_account.as_ref()],
        program_id,
    )
}

/// Inscription account owned by a mint
pub fn mint_inscription(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PREFIX, program_id.as_ref(), mint.as_ref()], program_id)
}

/// Associated inscription account for a tag
pub fn associated_inscription(
    program_id: &Pubkey,
    tag: &str,
    metadata_account: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            PREFIX,
            ASSOCIATION,
            tag.as_bytes(),
            metadata_account.as_ref(),
        ],
        program_id,
    )
}

/// Shard counter account
pub fn shard(program_id: &Pubkey, shard_number: u8) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[PREFIX, SHARD_PREFIX, program_id.as_ref(), &[shard_number]],
        program_id,
    )
}

/// Token metadata account of a mint
pub fn token_metadata(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            METADATA_PREFIX,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
}
