// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The live reload dependency graph.

Edges run file → shader → program → pipeline.  Nodes are arena keys, so the graph never keeps
an object alive; an edge to a destroyed object simply stops resolving.  Edges are never removed.
*/

use crate::imp::Backend;
use crate::pipeline::object::PipelineObject;
use crate::shaders::program::ProgramState;
use crate::shaders::shader::ShaderState;
use crate::watcher::arena::{Arena, PipelineKey, ProgramKey, ShaderKey};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How far a modification event got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CascadeOutcome {
    /// The path is not tracked.
    Untracked,
    /// No shader compiled from this file exists any more.
    Expired,
    /// The file could not be read.
    Unreadable,
    /// Every live shader of this file failed to recompile; nothing was relinked.
    CompileFailed,
    /// At least one shader recompiled and its dependents were processed.
    Recompiled,
}

/// What one modification event did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeReport {
    pub path: PathBuf,
    pub outcome: CascadeOutcome,
    /// Shaders built from this file that recompiled.
    pub recompiled: usize,
    pub compile_failures: usize,
    pub relinked: usize,
    pub link_failures: usize,
    pub realized: usize,
    pub realize_failures: usize,
}

impl CascadeReport {
    fn new(path: &Path, outcome: CascadeOutcome) -> Self {
        CascadeReport {
            path: path.to_path_buf(),
            outcome,
            recompiled: 0,
            compile_failures: 0,
            relinked: 0,
            link_failures: 0,
            realized: 0,
            realize_failures: 0,
        }
    }
}

/// Several shaders may read the same file, e.g. the vertex and fragment entry points of one module.
#[derive(Debug)]
struct TrackedFile {
    shaders: Vec<ShaderKey>,
    hash: Option<u64>,
}

#[derive(Debug, Default)]
struct Edges {
    files: HashMap<PathBuf, TrackedFile>,
    shader_programs: HashMap<ShaderKey, Vec<ProgramKey>>,
    program_pipelines: HashMap<ProgramKey, Vec<PipelineKey>>,
}

pub(crate) fn content_hash(path: &Path) -> Option<u64> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Some(hasher.finish())
}

fn add_edge<K: Eq + std::hash::Hash, V: PartialEq>(map: &mut HashMap<K, Vec<V>>, from: K, to: V) {
    let targets = map.entry(from).or_default();
    if !targets.contains(&to) {
        targets.push(to);
    }
}

pub(crate) struct Graph<B: Backend> {
    pub(crate) shaders: Arc<Arena<ShaderKey, ShaderState>>,
    pub(crate) programs: Arc<Arena<ProgramKey, ProgramState>>,
    pub(crate) pipelines: Arc<Arena<PipelineKey, PipelineObject<B>>>,
    edges: wasm_safe_mutex::Mutex<Edges>,
}

impl<B: Backend> Graph<B> {
    pub(crate) fn new() -> Self {
        Graph {
            shaders: Arc::new(Arena::new()),
            programs: Arc::new(Arena::new()),
            pipelines: Arc::new(Arena::new()),
            edges: wasm_safe_mutex::Mutex::new(Edges::default()),
        }
    }

    pub(crate) fn track_file(&self, path: PathBuf, shader: ShaderKey) {
        let hash = content_hash(&path);
        logwise::trace_sync!(
            "Watching {path}",
            path = path.display().to_string()
        );
        let mut edges = self.edges.lock_sync();
        let file = edges.files.entry(path).or_insert(TrackedFile {
            shaders: Vec::new(),
            hash,
        });
        if !file.shaders.contains(&shader) {
            file.shaders.push(shader);
        }
    }

    pub(crate) fn link_program(&self, shader: ShaderKey, program: ProgramKey) {
        add_edge(&mut self.edges.lock_sync().shader_programs, shader, program);
    }

    pub(crate) fn link_pipeline(&self, program: ProgramKey, pipeline: PipelineKey) {
        add_edge(&mut self.edges.lock_sync().program_pipelines, program, pipeline);
    }

    pub(crate) fn tracked_files(&self) -> usize {
        self.edges.lock_sync().files.len()
    }

    /// Rehashes every tracked file and returns the ones whose content changed.
    pub(crate) fn changed_files(&self) -> Vec<PathBuf> {
        let snapshot: Vec<(PathBuf, Option<u64>)> = self
            .edges
            .lock_sync()
            .files
            .iter()
            .map(|(path, file)| (path.clone(), file.hash))
            .collect();
        let mut changed = Vec::new();
        for (path, old) in snapshot {
            let new = content_hash(&path);
            //a file that vanished is not a modification
            if new.is_some() && new != old {
                if let Some(file) = self.edges.lock_sync().files.get_mut(&path) {
                    file.hash = new;
                }
                changed.push(path);
            }
        }
        changed
    }

    /// Records the current content of `path` as seen.
    pub(crate) fn rehash(&self, path: &Path) {
        let hash = content_hash(path);
        if let Some(file) = self.edges.lock_sync().files.get_mut(path) {
            file.hash = hash;
        }
    }

    /**
    Runs the recompile → relink → realize cascade for one modified file.

    Every shader read from the file recompiles first.  Each program depending on any of them
    then relinks once, and each pipeline built from those programs realizes once.  A failure
    stops only its own branch.  Expired objects are skipped.
    */
    pub(crate) fn cascade(&self, path: &Path) -> CascadeReport {
        let shader_keys = match self.edges.lock_sync().files.get(path) {
            Some(file) => file.shaders.clone(),
            None => return CascadeReport::new(path, CascadeOutcome::Untracked),
        };
        let shaders: Vec<(ShaderKey, Arc<ShaderState>)> = shader_keys
            .into_iter()
            .filter_map(|key| self.shaders.resolve(key).map(|shader| (key, shader)))
            .collect();
        if shaders.is_empty() {
            logwise::trace_sync!(
                "Dropping modification of {path}: no shader reads it any more",
                path = path.display().to_string()
            );
            return CascadeReport::new(path, CascadeOutcome::Expired);
        }
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                logwise::warn_sync!(
                    "Can't read {path}: {error}",
                    path = path.display().to_string(),
                    error = e.to_string()
                );
                return CascadeReport::new(path, CascadeOutcome::Unreadable);
            }
        };

        let mut report = CascadeReport::new(path, CascadeOutcome::CompileFailed);
        let mut program_keys: Vec<ProgramKey> = Vec::new();
        for (shader_key, shader) in shaders {
            if shader.recompile(&source).is_err() {
                report.compile_failures += 1;
                continue;
            }
            report.recompiled += 1;
            let edges = self.edges.lock_sync();
            for &program_key in edges.shader_programs.get(&shader_key).into_iter().flatten() {
                if !program_keys.contains(&program_key) {
                    program_keys.push(program_key);
                }
            }
        }
        if report.recompiled == 0 {
            return report;
        }
        report.outcome = CascadeOutcome::Recompiled;

        for program_key in program_keys {
            let Some(program) = self.programs.resolve(program_key) else {
                logwise::trace_sync!("Skipping expired program");
                continue;
            };
            if program.relink().is_err() {
                report.link_failures += 1;
                continue;
            }
            report.relinked += 1;

            let pipeline_keys = self
                .edges
                .lock_sync()
                .program_pipelines
                .get(&program_key)
                .cloned()
                .unwrap_or_default();
            for pipeline_key in pipeline_keys {
                let Some(pipeline) = self.pipelines.resolve(pipeline_key) else {
                    logwise::trace_sync!("Skipping expired pipeline");
                    continue;
                };
                match pipeline.realize() {
                    Ok(()) => report.realized += 1,
                    Err(_) => report.realize_failures += 1,
                }
            }
        }
        logwise::info_sync!(
            "Reloaded {path}: {recompiled} shaders recompiled, {relinked} programs relinked, {realized} pipelines realized",
            path = path.display().to_string(),
            recompiled = report.recompiled,
            relinked = report.relinked,
            realized = report.realized
        );
        report
    }
}
