// Candy machine v2 account layout and mint instruction assembly.

pub mod instructions;
pub mod state;

pub use instructions::{
    build_mint_plan, gateway_token_address, MintPlan, CANDY_MACHINE_PROGRAM_ID,
    GATEWAY_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID,
};
pub use state::{
    CandyMachineAccount, GatekeeperSettings, ProgramState, WhitelistSettings,
};
