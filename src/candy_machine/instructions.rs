use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};

use super::state::ProgramState;
use crate::error::LedgerError;

pub const CANDY_MACHINE_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ");
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
pub const GATEWAY_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("gatem74V238djXdzWnJf94Wo1DcnuGkfijbf3AuBhfs");

/// Anchor instruction discriminator: first 8 bytes of `sha256("global:<name>")`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

pub fn candy_machine_creator(candy_machine: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[b"candy_machine", candy_machine.as_ref()],
        &CANDY_MACHINE_PROGRAM_ID,
    )
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref(), b"edition"],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Gateway token PDA issued to `owner` by `network`.
pub fn gateway_token_address(owner: &Pubkey, network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), b"gateway", &[0u8; 8], network.as_ref()],
        &GATEWAY_PROGRAM_ID,
    )
    .0
}

pub fn network_expire_address(network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[network.as_ref(), b"expire"], &GATEWAY_PROGRAM_ID).0
}

/// Everything needed to mint one item, minus the signatures.
pub struct MintPlan {
    pub instructions: Vec<Instruction>,
    pub mint: Pubkey,
}

/// Builds the full instruction list for one `mint_nft` call: create and
/// initialize the new mint, create the payer's token account, mint one token,
/// then invoke the candy machine.
pub fn build_mint_plan(
    state: &ProgramState,
    payer: &Pubkey,
    mint: &Pubkey,
    mint_rent_lamports: u64,
) -> Result<MintPlan, LedgerError> {
    let token_program = spl_token::id();
    let user_token_account = get_associated_token_address(payer, mint);

    let mut instructions = vec![
        system_instruction::create_account(
            payer,
            mint,
            mint_rent_lamports,
            spl_token::state::Mint::LEN as u64,
            &token_program,
        ),
        spl_token::instruction::initialize_mint(&token_program, mint, payer, Some(payer), 0)
            .map_err(|e| LedgerError::Build(e.to_string()))?,
        create_associated_token_account(payer, payer, mint, &token_program),
        spl_token::instruction::mint_to(&token_program, mint, &user_token_account, payer, &[], 1)
            .map_err(|e| LedgerError::Build(e.to_string()))?,
    ];

    let (creator, creator_bump) = candy_machine_creator(&state.id);

    let mut accounts = vec![
        AccountMeta::new(state.id, false),
        AccountMeta::new_readonly(creator, false),
        AccountMeta::new(*payer, true),
        AccountMeta::new(state.treasury, false),
        AccountMeta::new(metadata_address(mint), false),
        AccountMeta::new(*mint, false),
        AccountMeta::new_readonly(*payer, true),
        AccountMeta::new_readonly(*payer, true),
        AccountMeta::new(master_edition_address(mint), false),
        AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(token_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
    ];
    accounts.extend(remaining_accounts(state, payer));

    let mut data = instruction_discriminator("mint_nft").to_vec();
    data.push(creator_bump);

    instructions.push(Instruction { program_id: CANDY_MACHINE_PROGRAM_ID, accounts, data });

    Ok(MintPlan { instructions, mint: *mint })
}

/// Optional accounts, in the order the program consumes them:
/// gateway token, whitelist token, SPL payment.
fn remaining_accounts(state: &ProgramState, payer: &Pubkey) -> Vec<AccountMeta> {
    let mut metas = Vec::new();

    if let Some(gk) = &state.gatekeeper {
        metas.push(AccountMeta::new(gateway_token_address(payer, &gk.network), false));
        if gk.expire_on_use {
            metas.push(AccountMeta::new_readonly(GATEWAY_PROGRAM_ID, false));
            metas.push(AccountMeta::new_readonly(network_expire_address(&gk.network), false));
        }
    }

    if let Some(wl) = &state.whitelist {
        metas.push(AccountMeta::new(get_associated_token_address(payer, &wl.mint), false));
        if wl.burn_every_time {
            metas.push(AccountMeta::new(wl.mint, false));
            metas.push(AccountMeta::new_readonly(*payer, true));
        }
    }

    if let Some(token_mint) = &state.token_mint {
        metas.push(AccountMeta::new(get_associated_token_address(payer, token_mint), false));
        metas.push(AccountMeta::new_readonly(*payer, true));
    }

    metas
}
