//! Inscribe Engine
//!
//! Client-side orchestration of inscriptions:
//! - [`InscriptionDriver`]: sizes an account and writes a payload into it
//!   until a fresh read matches, with bounded concurrency and retry
//! - [`ShardAllocator`]: create-or-fetch of the shard counters that rank new
//!   inscriptions
//!
//! # Example
//!
//! ```rust,ignore
//! use inscribe_engine::{DriverConfig, InscriptionDriver};
//!
//! let driver = InscriptionDriver::new(ledger, DriverConfig::default())?;
//! let report = driver.inscribe(&target, payload).await?;
//! println!("{}", report.summary());
//! ```

pub mod allocator;
pub mod config;
pub mod driver;
pub mod progress;

pub use allocator::{ShardAllocator, ShardHandle};
pub use config::DriverConfig;
pub use driver::{InscribeReport, InscriptionDriver};
pub use progress::ProgressEvent;

pub use tokio_util::sync::CancellationToken;
