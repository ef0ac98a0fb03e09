//! Remote API abstraction layer.
//!
//! The migrator talks to the destination repository only through
//! [`MigrationBackend`]:
//! - [`HttpBackend`] for the asset, content and migration HTTP APIs
//! - [`MockBackend`], an in-memory repository for tests

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend};
pub use traits::MigrationBackend;
