//! giftscan-core — foundation for the crash-resumable intent fulfillment scanner.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (giftscan-evm)
//!     ├── ScannerState     (checkpoint document, reorg rollback, 60s persist)
//!     ├── EventProcessor   (intent dedup, gift lookup, notification dispatch)
//!     └── stores           (CheckpointStore / IntentStore backends)
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod intents;
pub mod notify;
pub mod processor;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointStore, EventRecord, ScannerState};
pub use config::ScannerConfig;
pub use error::ScanError;
pub use intents::{Gift, GiftRecord, IntentRequest, IntentStatus, IntentStore};
pub use notify::{NotificationClient, NotificationSender};
pub use processor::EventProcessor;
pub use types::{EventFilter, EventKey, PresentIntentArgs, PresentIntentEvent};
