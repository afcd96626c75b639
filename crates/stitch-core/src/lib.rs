//! stitch-core - client library for Stitch backend apps
//!
//! This library provides the transport-independent core of a Stitch client:
//! credentials, the auth state machine, the authenticated request pipeline,
//! extended JSON, and function calls. HTTP and persistence are plugged in
//! through the [`Transport`] and [`Storage`] traits.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stitch_core::{AppClient, AppClientConfig, AppId, Credential, MemoryStorage, Transport};
//! use serde_json::json;
//!
//! # async fn example(transport: Arc<dyn Transport>) -> stitch_core::Result<()> {
//! let config = AppClientConfig::new(
//!     "https://stitch.mongodb.com",
//!     transport,
//!     Arc::new(MemoryStorage::new()),
//! )?;
//! let client = AppClient::new(AppId::new("todo-app-abcde")?, config)?;
//!
//! client.auth().login(&Credential::anonymous()).await?;
//! let greeting: String = client.call_function("echo", vec![json!("hello")]).await?;
//! println!("{}", greeting);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod auth;
pub mod codec;
pub mod error;
pub mod net;
pub mod registry;
pub mod routes;
pub mod services;
pub mod storage;
pub mod types;

// Re-export primary types at crate root for convenience
pub use app::{AppClient, AppClientConfig};
pub use auth::{
    AccessToken, AuthEvent, AuthInfo, AuthOptions, AuthState, CoreAuth, Credential,
    ListenerHandle, ProviderType, RefreshToken, UserProfile,
};
pub use codec::{Bson, Codec, Document};
pub use error::{
    AuthError, DecodeError, Error, InvalidInputError, ServiceError, ServiceErrorCode,
    StorageError, TransportError,
};
pub use net::{AuthRequestClient, HttpRequest, HttpResponse, Transport};
pub use registry::AppClientRegistry;
pub use routes::{AppRoutes, AuthRoutes, ServiceRoutes};
pub use services::ServiceClient;
pub use storage::{MemoryStorage, Storage};
pub use types::{AppId, BaseUrl};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
