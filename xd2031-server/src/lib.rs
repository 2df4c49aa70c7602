//! Server side of XD-2031: provider registry (C7), packet dispatcher
//! (C8), and the local filesystem provider (C9).

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fs_provider;
pub mod nameparse;
pub mod provider;
pub mod registry;

pub use config::RuntimeConfig;
pub use dispatch::Dispatcher;
pub use error::ServerError;
pub use fs_provider::LocalFsProvider;
pub use provider::{OpenKind, Provider};
pub use registry::ProviderRegistry;
