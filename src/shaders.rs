// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shaders and programs that can be rebuilt while in use.

pub mod compiler;
pub mod program;
pub mod shader;

pub use compiler::{ProgramLinker, ShaderCompiler, SourceCompiler, StageLinker};
pub use program::{LinkError, LinkedProgram, Program};
pub use shader::{CompileError, CompiledShader, Shader, ShaderDesc, ShaderStage};
