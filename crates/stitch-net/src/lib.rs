//! stitch-net - reqwest-backed transport for stitch-core.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stitch_core::{AppClient, AppClientConfig, AppId, MemoryStorage};
//! use stitch_net::ReqwestTransport;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let config = AppClientConfig::new(
//!     "https://stitch.mongodb.com",
//!     transport,
//!     Arc::new(MemoryStorage::new()),
//! )?;
//! let client = AppClient::new(AppId::new("todo-app-abcde")?, config)?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod transport;

pub use transport::ReqwestTransport;
