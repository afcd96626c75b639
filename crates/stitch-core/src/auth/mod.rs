//! Credentials, sessions and the auth state machine.
//!
//! All authenticated operations go through a [`CoreAuth`], which owns the
//! active session and attaches it to requests.

mod credential;
mod info;
mod profile;
mod session;
mod state;
mod store;
mod tokens;

pub use credential::{Credential, CredentialKind, ProviderCapabilities, ProviderType};
pub use info::{
    AuthInfo, AuthInfoCodec, FieldNames, LoginResponse, LoginResponseCodec, RefreshResponse,
    RefreshResponseCodec,
};
pub use profile::{UserIdentity, UserProfile, UserProfileCodec};
pub use session::{AuthOptions, CoreAuth, DEFAULT_EXPIRY_WINDOW_SECS};
pub use state::{AuthEvent, AuthState, ListenerHandle};
pub use store::{AuthInfoStore, SCHEMA_VERSION};
pub use tokens::{AccessToken, DecodedJwt, RefreshToken};
