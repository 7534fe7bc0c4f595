// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Programs: linked sets of shaders.

A [`Program`] snapshots the current binary of each of its shaders into a [`LinkedProgram`].
Pipelines build from the linked snapshot, so a shader recompile has no effect on a pipeline until
the program is relinked and the pipeline realized.
*/

use crate::shaders::compiler::ProgramLinker;
use crate::shaders::shader::{CompiledShader, Shader, ShaderStage};
use crate::watcher::arena::{ProgramKey, WatchSlot};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Can't link {label}: {message}")]
    Link { label: String, message: String },
}

/// An immutable snapshot of a successful link.
#[derive(Debug)]
pub struct LinkedProgram {
    label: String,
    stages: Vec<Arc<CompiledShader>>,
    generation: u64,
}

impl LinkedProgram {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stages(&self) -> &[Arc<CompiledShader>] {
        &self.stages
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&CompiledShader> {
        self.stages
            .iter()
            .find(|s| s.stage() == stage)
            .map(|s| s.as_ref())
    }

    /// Counts successful links of the owning program, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub(crate) struct ProgramState {
    label: String,
    shaders: Vec<Shader>,
    linker: Arc<dyn ProgramLinker>,
    linked: wasm_safe_mutex::Mutex<Arc<LinkedProgram>>,
    links: AtomicU64,
    link_attempts: AtomicU64,
}

fn link(
    label: &str,
    shaders: &[Shader],
    linker: &dyn ProgramLinker,
    generation: u64,
) -> Result<LinkedProgram, LinkError> {
    let stages: Vec<_> = shaders.iter().map(Shader::compiled).collect();
    linker
        .link(label, &stages)
        .map_err(|message| LinkError::Link {
            label: label.to_string(),
            message,
        })?;
    Ok(LinkedProgram {
        label: label.to_string(),
        stages,
        generation,
    })
}

impl ProgramState {
    pub(crate) fn relink(&self) -> Result<Arc<LinkedProgram>, LinkError> {
        self.link_attempts.fetch_add(1, Ordering::Relaxed);
        let generation = self.links.load(Ordering::Relaxed) + 1;
        match link(&self.label, &self.shaders, &*self.linker, generation) {
            Ok(linked) => {
                self.links.fetch_add(1, Ordering::Relaxed);
                let linked = Arc::new(linked);
                *self.linked.lock_sync() = linked.clone();
                logwise::info_sync!("Relinked program {label}", label = self.label.clone());
                Ok(linked)
            }
            Err(e) => {
                logwise::error_sync!(
                    "Program {label} failed to link, keeping the previous link: {error}",
                    label = self.label.clone(),
                    error = e.to_string()
                );
                Err(e)
            }
        }
    }

    pub(crate) fn linked(&self) -> Arc<LinkedProgram> {
        self.linked.lock_sync().clone()
    }

    pub(crate) fn shaders(&self) -> &[Shader] {
        &self.shaders
    }
}

struct ProgramShared {
    state: Arc<ProgramState>,
    watch: WatchSlot<ProgramKey, ProgramState>,
}

/// A set of shaders linked together.  Clones share the same program.
#[derive(Clone)]
pub struct Program {
    shared: Arc<ProgramShared>,
}

impl Program {
    /// Links `shaders`.  The first link must succeed.
    pub fn new(
        label: impl Into<String>,
        shaders: Vec<Shader>,
        linker: Arc<dyn ProgramLinker>,
    ) -> Result<Program, LinkError> {
        let label = label.into();
        let linked = link(&label, &shaders, &*linker, 1)?;
        Ok(Program {
            shared: Arc::new(ProgramShared {
                state: Arc::new(ProgramState {
                    label,
                    shaders,
                    linker,
                    linked: wasm_safe_mutex::Mutex::new(Arc::new(linked)),
                    links: AtomicU64::new(1),
                    link_attempts: AtomicU64::new(1),
                }),
                watch: WatchSlot::new(),
            }),
        })
    }

    /// Links the shaders' current binaries and, on success, replaces the current link.
    pub fn relink(&self) -> Result<Arc<LinkedProgram>, LinkError> {
        self.shared.state.relink()
    }

    /// The last good link.
    pub fn linked(&self) -> Arc<LinkedProgram> {
        self.shared.state.linked()
    }

    pub fn shaders(&self) -> &[Shader] {
        &self.shared.state.shaders
    }

    pub fn label(&self) -> &str {
        &self.shared.state.label
    }

    /// Number of links attempted, including failed ones.
    pub fn link_attempts(&self) -> u64 {
        self.shared.state.link_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn state(&self) -> &Arc<ProgramState> {
        &self.shared.state
    }

    pub(crate) fn watch_slot(&self) -> &WatchSlot<ProgramKey, ProgramState> {
        &self.shared.watch
    }

    pub fn ptr_eq(&self, other: &Program) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.shared.state.label)
            .field("shaders", &self.shared.state.shaders)
            .field("watch", &self.shared.watch)
            .finish()
    }
}
