//! Validated value types.
//!
//! These types enforce their invariants at construction time so that the
//! rest of the pipeline never has to re-check them.

mod app_id;
mod base_url;

pub use app_id::AppId;
pub use base_url::BaseUrl;
