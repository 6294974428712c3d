//! `ProxyEngine`: an [`Engine`] that forwards every call across a
//! control socket to a [`crate::remote::server`] instance, so the local
//! scheduler can treat a remotely compiled module exactly like a local
//! [`crate::backend::sync::SyncEngine`].

use std::cell::RefCell;
use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;

use crate::ast::Bits;
use crate::runtime::{Engine, EngineError, Interface};

use super::wire::{
    read_frame, write_frame, RpcHeader, RpcKind, WireBits, WireRecord, WireString, WireValue,
};

/// Call dispatch needs `&mut` access to the socket even from the
/// `Engine` trait's `&self` getters (`get_state`, `there_are_updates`,
/// ...) — a round trip is inherently a write-then-read. `RefCell` gives
/// that interior mutability without reaching for `unsafe`.
struct Conn {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

pub struct ProxyEngine {
    conn: RefCell<Conn>,
    process_id: u32,
    engine_id: u32,
}

impl ProxyEngine {
    pub fn connect(addr: &str, process_id: u32, engine_id: u32) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let write_half = stream.try_clone()?;
        Ok(ProxyEngine {
            conn: RefCell::new(Conn {
                reader: BufReader::new(stream),
                writer: BufWriter::new(write_half),
            }),
            process_id,
            engine_id,
        })
    }

    fn header(&self, kind: RpcKind) -> RpcHeader {
        RpcHeader {
            kind,
            process_id: self.process_id,
            engine_id: self.engine_id,
            n: 0,
        }
    }

    fn call<T: serde::Serialize, U: serde::de::DeserializeOwned>(
        &self,
        kind: RpcKind,
        payload: &T,
    ) -> std::io::Result<U> {
        self.call_with_kind(kind, payload).map(|(_, value)| value)
    }

    /// Like [`Self::call`], but also returns the reply's `RpcKind` (`Okay`
    /// vs. `Fail`) rather than discarding it — needed by call sites where
    /// the payload alone (often just `()`) can't carry success/failure.
    fn call_with_kind<T: serde::Serialize, U: serde::de::DeserializeOwned>(
        &self,
        kind: RpcKind,
        payload: &T,
    ) -> std::io::Result<(RpcKind, U)> {
        let header = self.header(kind);
        let mut conn = self.conn.borrow_mut();
        write_frame(&mut conn.writer, header, payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        conn.writer.flush()?;
        let (reply, bytes) = read_frame(&mut conn.reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let value = bincode::deserialize(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok((reply.kind, value))
    }

    /// Requests that the peer compile the named registered module into
    /// the engine this connection proxies; `false` if the slot pool was
    /// full or the name is unregistered.
    pub fn compile(&self, module_name: &str) -> std::io::Result<bool> {
        let (kind, ()) = self.call_with_kind(RpcKind::Compile, &WireString::new(module_name))?;
        Ok(kind == RpcKind::Okay)
    }

    /// Tells the peer to release this connection's compile slot, e.g.
    /// before recompiling a different module over the same connection.
    pub fn stop_compile(&self) -> std::io::Result<()> {
        self.call::<_, ()>(RpcKind::StopCompile, &())
    }

    /// Reads a single reply frame without sending anything, for call
    /// sites that already wrote their own request frame.
    fn recv<U: serde::de::DeserializeOwned>(&self) -> std::io::Result<U> {
        let mut conn = self.conn.borrow_mut();
        let (_, bytes) = read_frame(&mut conn.reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        bincode::deserialize(&bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Drains `{SysTask | Value}`-tagged records until an `OKAY` header,
    /// dispatching each system task through the local `Interface`.
    fn drain_records(&self, interface: &mut dyn Interface) -> std::io::Result<()> {
        loop {
            let mut conn = self.conn.borrow_mut();
            let (header, bytes) = read_frame(&mut conn.reader)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            drop(conn);
            if header.kind == RpcKind::Okay {
                return Ok(());
            }
            let record: WireRecord = bincode::deserialize(&bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            if let WireRecord::SysTask(task) = record {
                interface.info(task.text.as_str().as_ref());
            }
        }
    }
}

impl Engine for ProxyEngine {
    fn get_state(&self, name: &str) -> Option<Bits> {
        self.call::<_, Option<WireValue>>(RpcKind::GetState, &WireString::new(name))
            .ok()
            .flatten()
            .map(|v| v.bits.into())
    }

    fn set_state(&mut self, name: &str, value: Bits) -> bool {
        self.call::<_, bool>(
            RpcKind::SetState,
            &(WireString::new(name), WireBits::from(value)),
        )
        .unwrap_or(false)
    }

    fn get_input(&self, name: &str) -> Option<Bits> {
        self.get_state(name)
    }

    fn set_input(&mut self, name: &str, value: Bits) -> bool {
        self.set_state(name, value)
    }

    fn finalize(&mut self) {
        let _ = self.call::<_, ()>(RpcKind::Finalize, &());
    }

    fn evaluate(&mut self, interface: &mut dyn Interface) -> Result<(), EngineError> {
        {
            let header = self.header(RpcKind::Evaluate);
            let mut conn = self.conn.borrow_mut();
            write_frame(&mut conn.writer, header, &())
                .map_err(|e| EngineError::Evaluate(e.to_string()))?;
            conn.writer
                .flush()
                .map_err(|e| EngineError::Evaluate(e.to_string()))?;
        }
        self.drain_records(interface)
            .map_err(|e| EngineError::Evaluate(e.to_string()))
    }

    fn there_are_updates(&self) -> bool {
        self.call::<_, bool>(RpcKind::ThereAreUpdates, &())
            .unwrap_or(false)
    }

    fn update(&mut self) -> Result<(), EngineError> {
        self.call::<_, ()>(RpcKind::Update, &())
            .map_err(|e| EngineError::Update(e.to_string()))
    }

    fn there_were_tasks(&self) -> bool {
        self.call::<_, bool>(RpcKind::ThereWereTasks, &())
            .unwrap_or(false)
    }

    fn open_loop(&mut self, clk_vid: &str, val: Bits, target_iterations: u64) -> Result<u64, EngineError> {
        {
            let header = self.header(RpcKind::OpenLoop);
            let payload = (WireString::new(clk_vid), WireBits::from(val), target_iterations);
            let mut conn = self.conn.borrow_mut();
            write_frame(&mut conn.writer, header, &payload)
                .map_err(|e| EngineError::Evaluate(e.to_string()))?;
            conn.writer
                .flush()
                .map_err(|e| EngineError::Evaluate(e.to_string()))?;
        }
        self.recv::<u64>()
            .map_err(|e| EngineError::Evaluate(e.to_string()))
    }
}

// `RefCell` is not `Sync`, but `Engine: Send` only requires the engine
// be movable to another thread, not shared across threads concurrently;
// the scheduler owns each engine exclusively.
unsafe impl Send for ProxyEngine {}
