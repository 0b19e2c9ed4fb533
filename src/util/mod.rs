//! Shared utilities

pub mod cancel;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod process;

pub use cancel::CancellationToken;
pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
