// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Live reload of shaders, programs and pipelines.

A [`Watcher`] tracks shader source files.  When one changes it recompiles the shader, relinks
every program using it, and realizes every pipeline built from those programs.  Each step keeps
the last good state on failure, and a failure only stops its own branch of the cascade.

The watcher never keeps a watched object alive.  Dropping the last handle to a shader, program or
pipeline removes it from the watcher's view; modifications of files whose shader is gone are
dropped.

By default a background thread rehashes tracked files every [`WatcherConfig::poll_interval`].
[`Watcher::poll_now`] and [`Watcher::notify_modified`] run the same work on the calling thread.

```
use roots_and_heaps::watcher::{Watcher, WatcherConfig};
use roots_and_heaps::imp::SoftBackend;

let watcher: Watcher<SoftBackend> = Watcher::new(WatcherConfig::manual()).unwrap();
assert!(watcher.poll_now().is_empty());
```
*/

pub(crate) mod arena;
mod graph;
mod poll;

pub use arena::{PipelineKey, ProgramKey, ShaderKey};
pub use graph::{CascadeOutcome, CascadeReport};

use crate::imp::Backend;
use crate::pipeline::Pipeline;
use crate::shaders::{Program, Shader};
use graph::Graph;
use poll::PollThread;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// Whether to run a background poll thread.
    pub background: bool,
}

impl WatcherConfig {
    /// No background thread; call [`Watcher::poll_now`] yourself.
    pub fn manual() -> Self {
        WatcherConfig {
            background: false,
            ..WatcherConfig::default()
        }
    }
}

impl Default for WatcherConfig {
    /// Polls every 2 seconds, or every `RH_WATCH_INTERVAL_MS` milliseconds if that is set.
    fn default() -> Self {
        let poll_interval = std::env::var("RH_WATCH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        WatcherConfig {
            poll_interval,
            background: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WatchError {
    #[error("Shader {0} has no source file to watch")]
    NoSourcePath(String),
    #[error("{0} is already watched by another watcher")]
    ForeignWatcher(String),
    #[error("Can't start watcher thread {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct Watcher<B: Backend> {
    //declared first so it drops first: the thread is joined before the watcher's graph handle goes away
    poll: Option<PollThread>,
    graph: Arc<Graph<B>>,
    config: WatcherConfig,
}

impl<B: Backend> Watcher<B> {
    pub fn new(config: WatcherConfig) -> Result<Self, WatchError> {
        let graph = Arc::new(Graph::new());
        let poll = if config.background {
            Some(PollThread::spawn(graph.clone(), config.poll_interval)?)
        } else {
            None
        };
        Ok(Watcher {
            poll,
            graph,
            config,
        })
    }

    pub fn config(&self) -> WatcherConfig {
        self.config
    }

    fn shader_key(&self, shader: &Shader) -> Result<ShaderKey, WatchError> {
        shader
            .watch_slot()
            .register(&self.graph.shaders, || shader.state().clone())
            .ok_or_else(|| WatchError::ForeignWatcher(shader.label().to_string()))
    }

    /// Tracks the shader's source file.
    pub fn watch_shader(&self, shader: &Shader) -> Result<ShaderKey, WatchError> {
        let path = shader
            .path()
            .ok_or_else(|| WatchError::NoSourcePath(shader.label().to_string()))?
            .to_path_buf();
        let key = self.shader_key(shader)?;
        self.graph.track_file(path, key);
        Ok(key)
    }

    /// Relinks the program whenever one of its shaders recompiles.
    pub fn watch_program(&self, program: &Program) -> Result<ProgramKey, WatchError> {
        let key = program
            .watch_slot()
            .register(&self.graph.programs, || program.state().clone())
            .ok_or_else(|| WatchError::ForeignWatcher(program.label().to_string()))?;
        for shader in program.state().shaders() {
            let shader_key = self.shader_key(shader)?;
            self.graph.link_program(shader_key, key);
        }
        Ok(key)
    }

    /// Realizes the pipeline whenever its program relinks.  Also watches the program.
    pub fn watch_pipeline(&self, pipeline: &Pipeline<B>) -> Result<PipelineKey, WatchError> {
        let program_key = self.watch_program(pipeline.init().program())?;
        let key = pipeline
            .watch_slot()
            .register(&self.graph.pipelines, || pipeline.object().clone())
            .ok_or_else(|| WatchError::ForeignWatcher(pipeline.label().to_string()))?;
        self.graph.link_pipeline(program_key, key);
        Ok(key)
    }

    /// Rehashes every tracked file and runs the cascade for each one that changed.
    pub fn poll_now(&self) -> Vec<CascadeReport> {
        self.graph
            .changed_files()
            .into_iter()
            .map(|path| self.graph.cascade(&path))
            .collect()
    }

    /// Runs the cascade for `path` as if its content had changed.
    pub fn notify_modified(&self, path: &Path) -> CascadeReport {
        self.graph.rehash(path);
        self.graph.cascade(path)
    }

    pub fn tracked_files(&self) -> usize {
        self.graph.tracked_files()
    }

    /// Watched shaders that still exist.
    pub fn live_shaders(&self) -> usize {
        self.graph.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.graph.programs.len()
    }

    pub fn live_pipelines(&self) -> usize {
        self.graph.pipelines.len()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }
}

impl<B: Backend> std::fmt::Debug for Watcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("config", &self.config)
            .field("tracked_files", &self.graph.tracked_files())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftBackend;

    #[test]
    fn manual_config_spawns_nothing() {
        let watcher: Watcher<SoftBackend> = Watcher::new(WatcherConfig::manual()).unwrap();
        assert!(!watcher.is_polling());
        assert_eq!(watcher.tracked_files(), 0);
    }

    #[test]
    fn dropping_stops_the_thread() {
        let watcher: Watcher<SoftBackend> = Watcher::new(WatcherConfig {
            poll_interval: Duration::from_millis(5),
            background: true,
        })
        .unwrap();
        assert!(watcher.is_polling());
        std::thread::sleep(Duration::from_millis(20));
        drop(watcher);
    }

    #[test]
    fn the_poll_thread_releases_the_graph_on_drop() {
        let watcher: Watcher<SoftBackend> = Watcher::new(WatcherConfig {
            poll_interval: Duration::from_millis(5),
            background: true,
        })
        .unwrap();
        let graph = watcher.graph.clone();
        assert_eq!(Arc::strong_count(&graph), 3);
        drop(watcher);
        //the thread was joined, so only this handle is left
        assert_eq!(Arc::strong_count(&graph), 1);
    }

    #[test]
    fn untracked_paths_do_nothing() {
        let watcher: Watcher<SoftBackend> = Watcher::new(WatcherConfig::manual()).unwrap();
        let report = watcher.notify_modified(Path::new("/nowhere/shader.wgsl"));
        assert_eq!(report.outcome, CascadeOutcome::Untracked);
    }
}
