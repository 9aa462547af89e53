//! Periodic sensor tasks
//!
//! Each task runs one step closure on its own thread at a fixed cadence, so
//! a slow consumer or a chatty GNSS port never delays acoustic polling.

use log::{debug, info};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Milliseconds since a fixed start, shared by all tasks of one runtime
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Handle to a running task; stops and joins on drop
pub struct SensorTask {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorTask {
    /// Start calling `step(now_ms)` every `period` until stopped
    pub fn spawn<F>(name: &str, period: Duration, clock: Clock, mut step: F) -> io::Result<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let task_name = name.to_string();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            info!("{} task started ({} ms)", task_name, period.as_millis());
            while flag.load(Ordering::Relaxed) {
                let started = Instant::now();
                step(clock.now_ms());
                if let Some(rest) = period.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                } else {
                    debug!("{} step overran its period", task_name);
                }
            }
            info!("{} task stopped", task_name);
        })?;

        Ok(Self {
            name: name.to_string(),
            running,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask the task to stop after its current step and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorTask {
    fn drop(&mut self) {
        self.stop();
    }
}
