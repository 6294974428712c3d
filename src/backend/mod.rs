//! Lowering passes that turn an elaborated module into the restricted,
//! table-addressed form the synchronous and remote engines execute:
//! edge-triggered `always` blocks become state machines (`machinify`),
//! declarations and system tasks become table slots (`text_mangle`), and
//! the two are assembled into a runnable [`sync::SyncEngine`].

pub mod machinify;
pub mod sync;
pub mod text_mangle;
pub mod var_table;

pub use machinify::{Machine, Machinify};
pub use text_mangle::{SysTaskTemplate, TextMangle, TextMangleResult};
pub use var_table::{VarEntry, VarTable, CONTROL_REGISTERS};
