//! The engine ABI and the cooperative scheduler that drives one or more
//! engines (local `backend::sync::SyncEngine`s, or `remote::proxy`
//! engines standing in for a remote process) through the
//! evaluate/update/done-step/open-loop loop.

pub mod pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::Bits;
use pool::ThreadPool;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine evaluation failed: {0}")]
    Evaluate(String),
    #[error("engine update failed: {0}")]
    Update(String),
    #[error("remote engine disconnected: {0}")]
    Disconnected(String),
}

/// The operations a compiled module, local or remote, exposes to the
/// scheduler. Methods that can fail return `Result` rather than panic so
/// a single misbehaving engine degrades instead of taking the whole
/// simulation down.
pub trait Engine: Send {
    fn get_state(&self, name: &str) -> Option<Bits>;
    fn set_state(&mut self, name: &str, value: Bits) -> bool;
    fn get_input(&self, name: &str) -> Option<Bits>;
    fn set_input(&mut self, name: &str, value: Bits) -> bool;

    /// Called once at the end of a scheduler step; most engines have
    /// nothing special to do here.
    fn finalize(&mut self);

    fn overrides_done_step(&self) -> bool {
        false
    }
    fn overrides_done_simulation(&self) -> bool {
        false
    }

    fn read(&self, name: &str) -> Option<Bits> {
        self.get_state(name).or_else(|| self.get_input(name))
    }

    fn evaluate(&mut self, interface: &mut dyn Interface) -> Result<(), EngineError>;
    fn there_are_updates(&self) -> bool;
    fn update(&mut self) -> Result<(), EngineError>;
    fn there_were_tasks(&self) -> bool;
    fn conditional_update(&mut self) -> Result<(), EngineError> {
        if self.there_are_updates() {
            self.update()
        } else {
            Ok(())
        }
    }
    /// Free-runs for up to `target_iterations` cycles, toggling the named
    /// clock variable to `val` and back each cycle, returning the number
    /// of cycles actually executed.
    fn open_loop(
        &mut self,
        clk_vid: &str,
        val: Bits,
        target_iterations: u64,
    ) -> Result<u64, EngineError>;
}

/// The side channel engines use to report diagnostics and perform I/O
/// system tasks (`$display`, `$write`, `$finish`, ...).
pub trait Interface {
    fn error(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn info(&mut self, message: &str);
    fn display(&mut self, text: &str);
    fn write(&mut self, text: &str);
    fn finish(&mut self, code: i32);
}

/// An [`Interface`] that forwards everything to `tracing`, for engines
/// run outside of an interactive session (e.g. tests, headless batch
/// runs).
#[derive(Debug, Default)]
pub struct TracingInterface {
    pub finished: Option<i32>,
}

impl Interface for TracingInterface {
    fn error(&mut self, message: &str) {
        tracing::error!(target: "cascade::sim", "{message}");
    }
    fn warning(&mut self, message: &str) {
        tracing::warn!(target: "cascade::sim", "{message}");
    }
    fn info(&mut self, message: &str) {
        tracing::info!(target: "cascade::sim", "{message}");
    }
    fn display(&mut self, text: &str) {
        println!("{text}");
    }
    fn write(&mut self, text: &str) {
        print!("{text}");
    }
    fn finish(&mut self, code: i32) {
        self.finished = Some(code);
    }
}

/// Drives a set of engines through the evaluate/update/done-step/
/// open-loop loop described by the runtime's concurrency model: every
/// active engine evaluates before any engine updates, updates repeat
/// until the whole set is quiescent, then the designated clock engine is
/// allowed to run ahead open-loop before the next round.
pub struct Scheduler {
    engines: Vec<Box<dyn Engine>>,
    clock_engine: Option<usize>,
    clock_vid: String,
    clock_val: Bits,
    pool: Arc<ThreadPool>,
    stop: Arc<AtomicBool>,
    pub open_loop_target: u64,
}

impl Scheduler {
    pub fn new(engines: Vec<Box<dyn Engine>>, pool: Arc<ThreadPool>) -> Self {
        Scheduler {
            engines,
            clock_engine: None,
            clock_vid: "clk".to_string(),
            clock_val: Bits::from_u64(1, 1),
            pool,
            stop: Arc::new(AtomicBool::new(false)),
            open_loop_target: 1,
        }
    }

    /// Designates `index` as the engine `open_loop` free-runs once the
    /// whole engine set is quiescent, toggling its `clk_vid` variable.
    pub fn set_clock_engine(&mut self, index: usize) {
        self.clock_engine = Some(index);
    }

    /// Overrides the clock variable name/value `open_loop` toggles;
    /// defaults to `"clk"` asserted high.
    pub fn set_clock_signal(&mut self, clk_vid: &str, val: Bits) {
        self.clock_vid = clk_vid.to_string();
        self.clock_val = val;
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn wait_for_stop(&self) {
        while !self.stop_requested() {
            std::thread::yield_now();
        }
    }

    /// Runs one full cycle of the loop: evaluate, drain updates to
    /// quiescence, done_step, then open_loop the clock engine.
    pub fn step(&mut self, interface: &mut dyn Interface) -> Result<(), EngineError> {
        for (i, engine) in self.engines.iter_mut().enumerate() {
            if let Err(e) = engine.evaluate(interface) {
                warn!(engine = i, error = %e, "engine evaluate failed, degrading");
            }
        }

        loop {
            let pending: Vec<usize> = self
                .engines
                .iter()
                .enumerate()
                .filter(|(_, e)| e.there_are_updates())
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }
            for i in pending {
                if let Err(e) = self.engines[i].update() {
                    warn!(engine = i, error = %e, "engine update failed, degrading");
                }
            }
        }

        for engine in &mut self.engines {
            if engine.overrides_done_step() {
                engine.finalize();
            }
        }

        if let Some(idx) = self.clock_engine {
            match self.engines[idx].open_loop(&self.clock_vid, self.clock_val, self.open_loop_target) {
                Ok(n) => debug!(iterations = n, "clock engine ran open loop"),
                Err(e) => warn!(error = %e, "open_loop failed on clock engine"),
            }
        }

        Ok(())
    }

    pub fn run_until_stopped(&mut self, interface: &mut dyn Interface) -> Result<(), EngineError> {
        while !self.stop_requested() {
            self.step(interface)?;
        }
        Ok(())
    }

    pub fn thread_pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Read-only access to one of the driven engines, e.g. for a host
    /// application to sample state after `step`/`run_until_stopped`.
    pub fn engine(&self, index: usize) -> &dyn Engine {
        self.engines[index].as_ref()
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }
}
