//! Client for the ResearchAI chat server: conversation sync, accounts and
//! pay-to-verify of IPFS-stored responses.
pub mod account;
pub mod client;
pub mod config;
pub mod directory;
pub mod history;
pub mod sync;
pub mod terminal;
pub mod transcript;
pub mod wallet;

pub use client::{AccountBackend, ChatBackend, ClientError, ResearchClient};
pub use config::AppConfig;
pub use sync::ChatSync;
