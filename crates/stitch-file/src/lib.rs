//! stitch-file - filesystem-backed storage for stitch-core.
//!
//! Each key is stored in its own file under a root directory. Writes go to
//! a temporary file that is renamed over the old one, so readers never see
//! a partial value.

mod store;

pub use store::FileStorage;
