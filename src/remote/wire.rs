//! Wire framing for the remote engine RPC protocol: one fixed-size
//! header per call, `bincode`-encoded payloads for everything else.
//!
//! One-to-one with the RPC type enum in a C++ serialization header, plus
//! the control codes this crate's engine teardown/compile-slot model
//! needs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] bincode::Error),
    #[error("unexpected RPC kind: {0}")]
    UnexpectedKind(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RpcKind {
    Okay = 0,
    Fail,

    Compile,
    StopCompile,

    GetState,
    SetState,
    GetInput,
    SetInput,
    Finalize,

    OverridesDoneStep,
    DoneStep,
    OverridesDoneSimulation,
    DoneSimulation,

    Read,
    Evaluate,
    ThereAreUpdates,
    Update,
    ThereWereTasks,

    ConditionalUpdate,
    OpenLoop,

    EngineTeardown,
    ConnectionTeardown,
}

/// Fixed-size header preceding every RPC's payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RpcHeader {
    pub kind: RpcKind,
    pub process_id: u32,
    pub engine_id: u32,
    /// Payload length in bytes, read immediately after this header.
    pub n: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireString {
    pub bytes: Vec<u8>,
}

impl WireString {
    pub fn new(s: &str) -> Self {
        WireString {
            bytes: s.as_bytes().to_vec(),
        }
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireValue {
    pub id: u32,
    pub bits: WireBits,
}

/// `crate::ast::Bits` doesn't derive `Serialize` (it wraps a `u128`
/// directly, which `bincode` already handles), but it carries width and
/// signedness that have to travel with the raw value on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireBits {
    pub width: u32,
    pub signed: bool,
    pub value: u128,
}

impl From<crate::ast::Bits> for WireBits {
    fn from(b: crate::ast::Bits) -> Self {
        WireBits {
            width: b.width(),
            signed: b.is_signed(),
            value: b.raw(),
        }
    }
}

impl From<WireBits> for crate::ast::Bits {
    fn from(w: WireBits) -> Self {
        crate::ast::Bits::new(w.width, w.signed, w.value)
    }
}

/// A system-task call surfaced mid-`evaluate`/`update`/`open_loop`, sent
/// as part of the tagged `{SysTask | Value}` record stream the proxy
/// reads until the terminating `OKAY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSysTask {
    pub kind: u8,
    pub text: WireString,
    pub arg: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireRecord {
    SysTask(WireSysTask),
    Value(WireValue),
}

/// Writes `header` followed by `bincode`-encoded `payload` to `w`.
pub fn write_frame<W: std::io::Write, T: Serialize>(
    w: &mut W,
    mut header: RpcHeader,
    payload: &T,
) -> Result<(), WireError> {
    let encoded = bincode::serialize(payload)?;
    header.n = encoded.len() as u32;
    let header_bytes = bincode::serialize(&header)?;
    w.write_all(&header_bytes)?;
    w.write_all(&encoded)?;
    Ok(())
}

pub fn read_frame<R: std::io::Read>(r: &mut R) -> Result<(RpcHeader, Vec<u8>), WireError> {
    let header: RpcHeader = bincode::deserialize_from(&mut *r)?;
    let mut payload = vec![0u8; header.n as usize];
    r.read_exact(&mut payload)?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip() {
        let mut buf = Vec::new();
        let header = RpcHeader {
            kind: RpcKind::Evaluate,
            process_id: 1,
            engine_id: 2,
            n: 0,
        };
        write_frame(&mut buf, header, &WireString::new("hello")).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (read_header, payload) = read_frame(&mut cursor).unwrap();
        assert_eq!(read_header.process_id, 1);
        assert_eq!(read_header.engine_id, 2);
        let decoded: WireString = bincode::deserialize(&payload).unwrap();
        assert_eq!(decoded.as_str(), "hello");
    }

    #[test]
    fn bits_round_trip_through_wire_bits() {
        let original = crate::ast::Bits::from_u64(16, 42);
        let wire: WireBits = original.into();
        let back: crate::ast::Bits = wire.into();
        assert_eq!(back.to_u64(), 42);
        assert_eq!(back.width(), 16);
    }
}
