// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pluggable compile and link steps.

use crate::shaders::shader::{CompiledShader, ShaderStage};
use std::sync::Arc;

/// Turns shader source into a backend binary.
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, stage: ShaderStage, entry_point: &str, source: &str) -> Result<Vec<u8>, String>;
}

impl<F> ShaderCompiler for F
where
    F: Fn(ShaderStage, &str, &str) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn compile(&self, stage: ShaderStage, entry_point: &str, source: &str) -> Result<Vec<u8>, String> {
        self(stage, entry_point, source)
    }
}

/**
Passes source through unchanged.

Suited to backends that compile at pipeline creation, such as wgpu with WGSL.  Rejects empty
source and source that never mentions the entry point.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCompiler;

impl ShaderCompiler for SourceCompiler {
    fn compile(&self, _stage: ShaderStage, entry_point: &str, source: &str) -> Result<Vec<u8>, String> {
        if source.trim().is_empty() {
            return Err("empty shader source".to_string());
        }
        if !source.contains(entry_point) {
            return Err(format!("entry point `{entry_point}` not found"));
        }
        Ok(source.as_bytes().to_vec())
    }
}

/// Checks that a set of compiled stages forms a program.
pub trait ProgramLinker: Send + Sync {
    fn link(&self, label: &str, stages: &[Arc<CompiledShader>]) -> Result<(), String>;
}

impl<F> ProgramLinker for F
where
    F: Fn(&str, &[Arc<CompiledShader>]) -> Result<(), String> + Send + Sync,
{
    fn link(&self, label: &str, stages: &[Arc<CompiledShader>]) -> Result<(), String> {
        self(label, stages)
    }
}

/// Accepts any program with at least one stage and no stage given twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageLinker;

impl ProgramLinker for StageLinker {
    fn link(&self, _label: &str, stages: &[Arc<CompiledShader>]) -> Result<(), String> {
        if stages.is_empty() {
            return Err("program has no stages".to_string());
        }
        for (i, a) in stages.iter().enumerate() {
            if stages[i + 1..].iter().any(|b| b.stage() == a.stage()) {
                return Err(format!("{:?} stage given twice", a.stage()));
            }
        }
        Ok(())
    }
}
