//! Re-export of the arena's bit-vector type under the name the rest of
//! `analysis` and `backend` refer to it by. The type itself lives in
//! [`crate::ast::bits`] since [`crate::ast::NodeKind::Number`] literals
//! are stored in it directly; `evaluate` and `machinify` just borrow it.

pub use crate::ast::bits::{Bits as BitVector, NumberFlags, NumberFormat};
