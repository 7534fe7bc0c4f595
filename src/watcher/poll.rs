// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Background thread that rehashes watched files.

use crate::imp::Backend;
use crate::watcher::graph::Graph;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct PollThread {
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl PollThread {
    pub(crate) fn spawn<B: Backend>(
        graph: Arc<Graph<B>>,
        interval: Duration,
    ) -> std::io::Result<PollThread> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let (wake, woken): (Sender<()>, Receiver<()>) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("shader_watcher".to_string())
            .spawn(move || {
                while !shutdown_clone.load(Ordering::Relaxed) {
                    match woken.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if shutdown_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    for path in graph.changed_files() {
                        graph.cascade(&path);
                    }
                }
            })?;
        Ok(PollThread {
            thread: Some(thread),
            shutdown,
            wake,
        })
    }
}

impl Drop for PollThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.wake.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
