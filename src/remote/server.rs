//! The `--slave-mode` peer: accepts control connections, runs a
//! [`CompileSlots`] admission scheme bounding how many modules compile
//! concurrently, and proxies the `Engine` ABI to a locally-compiled
//! [`SyncEngine`] for each accepted connection.
//!
//! Grounded on `de10_compiler.cc`'s slot pool (`FREE`/`COMPILING`/
//! `WAITING`/`CURRENT`/`STOPPED`, `get_free_slot`, `stop_compile`'s
//! promote-next-waiting-slot logic) with the FPGA-specific memory
//! mapping and JTAG reprogramming stripped out, since this runtime has
//! no physical fabric to program.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::ast::{Arena, NodeId};
use crate::backend::sync::SyncEngine;
use crate::runtime::{Engine, Interface, TracingInterface};

use super::wire::{RpcHeader, RpcKind, WireBits, WireString, WireValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Compiling,
    Waiting,
    Current,
    Stopped,
}

struct Slot {
    process_id: u32,
    state: SlotState,
}

/// Bounds how many modules may be mid-compile at once, exactly the way
/// `De10Compiler`'s `slots_` vector does, minus the hardware-specific
/// steps (memory mapping, JTAG programming) that don't apply to an
/// interpreted engine.
pub struct CompileSlots {
    slots: Vec<Slot>,
}

impl CompileSlots {
    pub fn new(capacity: usize) -> Self {
        CompileSlots {
            slots: (0..capacity)
                .map(|_| Slot {
                    process_id: 0,
                    state: SlotState::Free,
                })
                .collect(),
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.state == SlotState::Free)
    }

    /// Reserves a slot for `process_id`, downgrading any currently
    /// compiling slot to waiting first (only one compile proceeds at a
    /// time; everything else queues).
    pub fn reserve(&mut self, process_id: u32) -> Option<usize> {
        let slot = self.free_slot()?;
        for s in &mut self.slots {
            if s.state == SlotState::Compiling {
                s.state = SlotState::Waiting;
            }
        }
        self.slots[slot].process_id = process_id;
        self.slots[slot].state = SlotState::Compiling;
        Some(slot)
    }

    pub fn mark_current(&mut self, slot: usize) {
        self.slots[slot].state = SlotState::Current;
    }

    pub fn release(&mut self, slot: usize) {
        self.slots[slot].state = SlotState::Free;
    }

    pub fn id_in_use(&self, process_id: u32) -> bool {
        self.slots
            .iter()
            .any(|s| s.process_id == process_id && s.state != SlotState::Free)
    }

    /// Stops every slot owned by `process_id`, promoting the next
    /// waiting slot to compiling if the stopped slot held the lead.
    pub fn stop(&mut self, process_id: u32) {
        let mut need_new_owner = false;
        for s in &mut self.slots {
            if s.process_id == process_id {
                match s.state {
                    SlotState::Compiling => {
                        need_new_owner = true;
                        s.state = SlotState::Stopped;
                    }
                    SlotState::Waiting => s.state = SlotState::Stopped,
                    _ => {}
                }
            }
        }
        if need_new_owner {
            if let Some(next) = self.slots.iter_mut().find(|s| s.state == SlotState::Waiting) {
                next.state = SlotState::Compiling;
            }
        }
    }
}

/// The shared module registry a slave process compiles against: the
/// HDL lexer/parser is out of scope, so modules are registered by name
/// ahead of time (by whatever built the `Arena`) rather than parsed
/// from text that crosses the wire.
pub struct ModuleRegistry {
    pub arena: Arena,
    pub modules: HashMap<String, NodeId>,
}

pub struct RemoteRuntime {
    registry: Arc<Mutex<ModuleRegistry>>,
    slots: Arc<Mutex<CompileSlots>>,
}

impl RemoteRuntime {
    pub fn new(registry: ModuleRegistry, slot_capacity: usize) -> Self {
        RemoteRuntime {
            registry: Arc::new(Mutex::new(registry)),
            slots: Arc::new(Mutex::new(CompileSlots::new(slot_capacity))),
        }
    }

    /// Runs the accept loop until `stop` is set, polling it every tick
    /// so `SIGINT`-style cancellation is observed promptly.
    pub async fn run(
        &self,
        listen_addr: &str,
        stop: Arc<std::sync::atomic::AtomicBool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!(addr = listen_addr, "remote runtime listening");
        while !stop.load(std::sync::atomic::Ordering::Acquire) {
            let accepted = tokio::time::timeout(Duration::from_millis(1), listener.accept()).await;
            let (stream, peer) = match accepted {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
                Err(_) => continue,
            };
            info!(%peer, "accepted remote control connection");
            let registry = self.registry.clone();
            let slots = self.slots.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, registry, slots).await {
                    warn!(error = %e, "remote connection ended with error");
                }
            });
        }
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    registry: Arc<Mutex<ModuleRegistry>>,
    slots: Arc<Mutex<CompileSlots>>,
) -> std::io::Result<()> {
    let mut engine: Option<SyncEngine> = None;
    let mut reserved_slot: Option<usize> = None;

    loop {
        let (header, bytes) = read_frame_async(&mut stream).await?;
        match header.kind {
            RpcKind::Compile => {
                let module_name: WireString = bincode::deserialize(&bytes)
                    .unwrap_or_else(|_| WireString::new(""));
                let slot = slots.lock().reserve(header.process_id);
                let Some(slot) = slot else {
                    respond(&mut stream, header, RpcKind::Fail, &()).await?;
                    continue;
                };
                reserved_slot = Some(slot);

                let built = {
                    let reg = registry.lock();
                    reg.modules.get(module_name.as_str().as_ref()).copied()
                };
                let compiled = match built {
                    Some(module_id) => {
                        let reg = registry.lock();
                        SyncEngine::compile(reg.arena.clone(), module_id, &reg.modules).ok()
                    }
                    None => None,
                };
                match compiled {
                    Some(e) => {
                        engine = Some(e);
                        slots.lock().mark_current(slot);
                        respond(&mut stream, header, RpcKind::Okay, &()).await?;
                    }
                    None => {
                        slots.lock().release(slot);
                        reserved_slot = None;
                        respond(&mut stream, header, RpcKind::Fail, &()).await?;
                    }
                }
            }
            RpcKind::StopCompile => {
                slots.lock().stop(header.process_id);
                respond(&mut stream, header, RpcKind::Okay, &()).await?;
            }
            RpcKind::GetState => {
                let name: WireString = bincode::deserialize(&bytes).unwrap_or_else(|_| WireString::new(""));
                let value = engine
                    .as_ref()
                    .and_then(|e| e.get_state(name.as_str().as_ref()))
                    .map(|b| WireValue { id: 0, bits: WireBits::from(b) });
                respond(&mut stream, header, RpcKind::Okay, &value).await?;
            }
            RpcKind::SetState | RpcKind::SetInput => {
                let (name, bits): (WireString, WireBits) =
                    bincode::deserialize(&bytes).unwrap_or_else(|_| (WireString::new(""), WireBits { width: 0, signed: false, value: 0 }));
                let ok = engine
                    .as_mut()
                    .map(|e| e.set_state(name.as_str().as_ref(), bits.into()))
                    .unwrap_or(false);
                respond(&mut stream, header, RpcKind::Okay, &ok).await?;
            }
            RpcKind::Evaluate => {
                let mut interface = TracingInterface::default();
                let result = engine.as_mut().map(|e| e.evaluate(&mut interface));
                let kind = if matches!(result, Some(Ok(()))) { RpcKind::Okay } else { RpcKind::Fail };
                respond(&mut stream, header, kind, &()).await?;
            }
            RpcKind::ThereAreUpdates => {
                let ok = engine.as_ref().map(|e| e.there_are_updates()).unwrap_or(false);
                respond(&mut stream, header, RpcKind::Okay, &ok).await?;
            }
            RpcKind::Update => {
                let result = engine.as_mut().map(|e| e.update());
                let kind = if matches!(result, Some(Ok(()))) { RpcKind::Okay } else { RpcKind::Fail };
                respond(&mut stream, header, kind, &()).await?;
            }
            RpcKind::ThereWereTasks => {
                let ok = engine.as_ref().map(|e| e.there_were_tasks()).unwrap_or(false);
                respond(&mut stream, header, RpcKind::Okay, &ok).await?;
            }
            RpcKind::OpenLoop => {
                let (clk_vid, val, target): (WireString, WireBits, u64) =
                    bincode::deserialize(&bytes).unwrap_or_else(|_| {
                        (WireString::new("clk"), WireBits { width: 1, signed: false, value: 1 }, 0)
                    });
                let ran = engine
                    .as_mut()
                    .and_then(|e| e.open_loop(clk_vid.as_str().as_ref(), val.into(), target).ok())
                    .unwrap_or(0);
                respond(&mut stream, header, RpcKind::Okay, &ran).await?;
            }
            RpcKind::EngineTeardown | RpcKind::ConnectionTeardown => {
                if let Some(slot) = reserved_slot.take() {
                    slots.lock().release(slot);
                }
                return Ok(());
            }
            _ => {
                respond(&mut stream, header, RpcKind::Fail, &()).await?;
            }
        }
    }
}

async fn read_frame_async(stream: &mut TcpStream) -> std::io::Result<(RpcHeader, Vec<u8>)> {
    let mut header_buf = vec![0u8; bincode::serialized_size(&RpcHeader {
        kind: RpcKind::Okay,
        process_id: 0,
        engine_id: 0,
        n: 0,
    })
    .unwrap_or(32) as usize];
    stream.read_exact(&mut header_buf).await?;
    let header: RpcHeader = bincode::deserialize(&header_buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut payload = vec![0u8; header.n as usize];
    stream.read_exact(&mut payload).await?;
    Ok((header, payload))
}

async fn respond<T: serde::Serialize>(
    stream: &mut TcpStream,
    request: RpcHeader,
    kind: RpcKind,
    payload: &T,
) -> std::io::Result<()> {
    let encoded = bincode::serialize(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let header = RpcHeader {
        kind,
        process_id: request.process_id,
        engine_id: request.engine_id,
        n: encoded.len() as u32,
    };
    let header_bytes =
        bincode::serialize(&header).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    stream.write_all(&header_bytes).await?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_downgrades_compiling_to_waiting() {
        let mut slots = CompileSlots::new(2);
        let a = slots.reserve(1).unwrap();
        slots.mark_current(a);
        let b = slots.reserve(2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn stop_promotes_next_waiting_slot() {
        let mut slots = CompileSlots::new(1);
        let a = slots.reserve(1).unwrap();
        assert_eq!(slots.slots[a].state, SlotState::Compiling);
        slots.stop(1);
        assert_eq!(slots.slots[a].state, SlotState::Stopped);
    }

    #[test]
    fn id_in_use_reports_non_free_slots() {
        let mut slots = CompileSlots::new(1);
        assert!(!slots.id_in_use(7));
        slots.reserve(7);
        assert!(slots.id_in_use(7));
    }
}
