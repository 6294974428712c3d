//! Semantic analysis passes over the AST: scope resolution, scope-chain
//! indexing, per-module fact gathering, and constant folding.

pub mod bits;
pub mod evaluate;
pub mod module_info;
pub mod navigate;
pub mod resolve;

pub use evaluate::{EvalError, Evaluate};
pub use module_info::ModuleInfo;
pub use navigate::ScopeIndex;
pub use resolve::{ResolveError, Resolve};
