// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pipeline state and realization.

pub mod object;
pub mod state;

pub use object::{Pipeline, RealizeError};
pub use state::{
    BlendMode, CompareFunction, ComputeState, CullMode, DepthStencilState, FillMode,
    GraphicsState, HitGroup, LocalLayout, PipelineInit, RasterizerState, RaytracingState,
    Topology, VertexFieldType, VertexLayout,
};
