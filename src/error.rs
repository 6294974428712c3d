//! Crate-level error type: each subsystem keeps its own `thiserror` enum;
//! this just unifies them behind one `#[from]`-derived type for the CLI
//! boundary.

use thiserror::Error;

use crate::analysis::ResolveError;
use crate::backend::sync::CompileError;
use crate::elaborate::ElaborateError;
use crate::remote::{SynthesisError, WireError};
use crate::runtime::EngineError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Elaborate(#[from] ElaborateError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Config(#[from] figment::Error),
    #[error("no top-level module named `{0}`")]
    UnknownTopModule(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
