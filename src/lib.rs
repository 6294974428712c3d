//! Cascade: a just-in-time compiler and execution engine for a
//! synchronous hardware description language.
//!
//! An [`ast::Arena`]-held design goes through [`analysis::Resolve`] and
//! [`elaborate::Elaborate`] and is lowered by [`backend`] into a
//! [`backend::sync::SyncEngine`] a [`runtime::Scheduler`] can drive, or
//! is handed off across [`remote`] to a `--slave-mode` peer via a
//! [`runtime::Engine`]-implementing [`remote::ProxyEngine`].

pub mod analysis;
pub mod ast;
pub mod backend;
pub mod config;
pub mod elaborate;
pub mod error;
pub mod remote;
pub mod runtime;

pub use config::Config;
pub use error::Error;
