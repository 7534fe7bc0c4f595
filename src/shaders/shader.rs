// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shaders that can be recompiled in place.

A [`Shader`] keeps its last good [`CompiledShader`].  [`Shader::recompile`] swaps in a new binary
only if compilation succeeds; on failure the old binary stays and the error is returned.
*/

use crate::bindings::stages::Stages;
use crate::shaders::compiler::ShaderCompiler;
use crate::watcher::arena::{ShaderKey, WatchSlot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Fragment,
    Compute,
    RayGeneration,
    Miss,
    ClosestHit,
    AnyHit,
    Intersection,
    Callable,
}

impl ShaderStage {
    pub fn stages(self) -> Stages {
        match self {
            ShaderStage::Vertex => Stages::VERTEX,
            ShaderStage::Hull => Stages::HULL,
            ShaderStage::Domain => Stages::DOMAIN,
            ShaderStage::Geometry => Stages::GEOMETRY,
            ShaderStage::Fragment => Stages::FRAGMENT,
            ShaderStage::Compute => Stages::COMPUTE,
            ShaderStage::RayGeneration
            | ShaderStage::Miss
            | ShaderStage::ClosestHit
            | ShaderStage::AnyHit
            | ShaderStage::Intersection
            | ShaderStage::Callable => Stages::RAYTRACING,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    #[error("Can't compile {label}: {message}")]
    Compile { label: String, message: String },
    #[error("Can't read shader source {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One successful compilation.
#[derive(Debug)]
pub struct CompiledShader {
    stage: ShaderStage,
    entry_point: String,
    code: Vec<u8>,
    generation: u64,
}

impl CompiledShader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
    pub fn code(&self) -> &[u8] {
        &self.code
    }
    /// Counts successful compilations of the owning shader, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a shader is made from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderDesc {
    pub label: String,
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Source file watched for live reload, if any.
    pub path: Option<PathBuf>,
}

impl ShaderDesc {
    pub fn new(label: impl Into<String>, stage: ShaderStage, entry_point: impl Into<String>) -> Self {
        ShaderDesc {
            label: label.into(),
            stage,
            entry_point: entry_point.into(),
            path: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

pub(crate) struct ShaderState {
    desc: ShaderDesc,
    compiler: Arc<dyn ShaderCompiler>,
    compiled: wasm_safe_mutex::Mutex<Arc<CompiledShader>>,
    generations: AtomicU64,
    compile_attempts: AtomicU64,
}

fn build(
    desc: &ShaderDesc,
    compiler: &dyn ShaderCompiler,
    generation: u64,
    source: &str,
) -> Result<CompiledShader, CompileError> {
    let code = compiler
        .compile(desc.stage, &desc.entry_point, source)
        .map_err(|message| CompileError::Compile {
            label: desc.label.clone(),
            message,
        })?;
    Ok(CompiledShader {
        stage: desc.stage,
        entry_point: desc.entry_point.clone(),
        code,
        generation,
    })
}

impl ShaderState {
    fn compile(&self, source: &str) -> Result<CompiledShader, CompileError> {
        self.compile_attempts.fetch_add(1, Ordering::Relaxed);
        let compiled = build(
            &self.desc,
            &*self.compiler,
            self.generations.load(Ordering::Relaxed) + 1,
            source,
        )?;
        self.generations.fetch_add(1, Ordering::Relaxed);
        Ok(compiled)
    }

    pub(crate) fn recompile(&self, source: &str) -> Result<(), CompileError> {
        match self.compile(source) {
            Ok(compiled) => {
                *self.compiled.lock_sync() = Arc::new(compiled);
                logwise::info_sync!("Recompiled shader {label}", label = self.desc.label.clone());
                Ok(())
            }
            Err(e) => {
                logwise::error_sync!(
                    "Shader {label} failed to compile, keeping the previous binary: {error}",
                    label = self.desc.label.clone(),
                    error = e.to_string()
                );
                Err(e)
            }
        }
    }

    pub(crate) fn compiled(&self) -> Arc<CompiledShader> {
        self.compiled.lock_sync().clone()
    }

    pub(crate) fn desc(&self) -> &ShaderDesc {
        &self.desc
    }
}

struct ShaderShared {
    state: Arc<ShaderState>,
    watch: WatchSlot<ShaderKey, ShaderState>,
}

/// A shader stage with a swappable compiled binary.  Clones share the same shader.
#[derive(Clone)]
pub struct Shader {
    shared: Arc<ShaderShared>,
}

impl Shader {
    /// Compiles `source`.  The first compilation must succeed.
    pub fn new(
        desc: ShaderDesc,
        source: &str,
        compiler: Arc<dyn ShaderCompiler>,
    ) -> Result<Shader, CompileError> {
        let compiled = build(&desc, &*compiler, 1, source)?;
        let state = ShaderState {
            desc,
            compiler,
            compiled: wasm_safe_mutex::Mutex::new(Arc::new(compiled)),
            generations: AtomicU64::new(1),
            compile_attempts: AtomicU64::new(1),
        };
        Ok(Shader {
            shared: Arc::new(ShaderShared {
                state: Arc::new(state),
                watch: WatchSlot::new(),
            }),
        })
    }

    /// Reads and compiles the file at `desc.path`.
    pub fn from_file(desc: ShaderDesc, compiler: Arc<dyn ShaderCompiler>) -> Result<Shader, CompileError> {
        let path = desc.path.clone().unwrap_or_default();
        let source = std::fs::read_to_string(&path).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        Shader::new(desc, &source, compiler)
    }

    /// Compiles `source` and, on success, replaces the current binary.
    pub fn recompile(&self, source: &str) -> Result<(), CompileError> {
        self.shared.state.recompile(source)
    }

    /// The last good binary.
    pub fn compiled(&self) -> Arc<CompiledShader> {
        self.shared.state.compiled()
    }

    pub fn desc(&self) -> &ShaderDesc {
        self.shared.state.desc()
    }

    pub fn label(&self) -> &str {
        &self.desc().label
    }

    pub fn stage(&self) -> ShaderStage {
        self.desc().stage
    }

    pub fn path(&self) -> Option<&Path> {
        self.desc().path.as_deref()
    }

    /// Number of compilations attempted, including failed ones.
    pub fn compile_attempts(&self) -> u64 {
        self.shared.state.compile_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn state(&self) -> &Arc<ShaderState> {
        &self.shared.state
    }

    pub(crate) fn watch_slot(&self) -> &WatchSlot<ShaderKey, ShaderState> {
        &self.shared.watch
    }

    pub fn ptr_eq(&self, other: &Shader) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("desc", self.desc())
            .field("watch", &self.shared.watch)
            .finish()
    }
}
