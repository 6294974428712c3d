//! Remote compilation and execution: a control-socket wire protocol
//! (`wire`), a client-side [`Engine`](crate::runtime::Engine) that
//! forwards calls across it (`proxy`), the `--slave-mode` accept loop
//! and compile-slot admission scheme that answers those calls
//! (`server`), and the on-disk synthesis cache a slave process
//! consults before shelling out to an external toolchain (`synth`).

pub mod proxy;
pub mod server;
pub mod synth;
pub mod wire;

pub use proxy::ProxyEngine;
pub use server::{CompileSlots, ModuleRegistry, RemoteRuntime};
pub use synth::{SynthesisCache, SynthesisError};
pub use wire::WireError;
