//! giftscan-evm — ledger access and the scan/scheduler engine.

pub mod client;
pub mod rpc;
pub mod scanner;
pub mod scheduler;

pub use client::{decode_present_intent, ChainClient, RawLog};
pub use rpc::HttpChainClient;
pub use scanner::{BlockTimestampCache, Scanner};
pub use scheduler::{CycleSummary, Scheduler};
