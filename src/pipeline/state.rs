// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pipeline descriptions.

A [`PipelineInit`] is a tagged sum: graphics, compute or raytracing, each carrying only the state
that kind of pipeline has.  Every variant names the [`Program`] it runs and the
[`RootBindingLayout`] it binds against.
*/

use crate::bindings::layout::PipelineType;
use crate::bindings::resources::TextureFormat;
use crate::bindings::root_layout::RootBindingLayout;
use crate::imp::Backend;
use crate::shaders::Program;
use std::sync::Arc;

/// Describes the memory layout of one vertex.
///
/// Fields are laid out back to back, in the order they are added; each field is one attribute
/// location.
///
/// ```
/// use roots_and_heaps::pipeline::state::{VertexLayout, VertexFieldType};
///
/// let mut layout = VertexLayout::new();
/// layout.add_field("position", VertexFieldType::F32x3);
/// layout.add_field("uv", VertexFieldType::F32x2);
/// assert_eq!(layout.element_stride(), 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub(crate) fields: Vec<VertexField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VertexField {
    pub(crate) name: &'static str,
    pub(crate) r#type: VertexFieldType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VertexFieldType {
    F32,
    F32x2,
    F32x3,
    F32x4,
    U32,
}

impl VertexFieldType {
    pub(crate) fn stride(&self) -> u32 {
        match self {
            VertexFieldType::F32 | VertexFieldType::U32 => 4,
            VertexFieldType::F32x2 => 8,
            VertexFieldType::F32x3 => 12,
            VertexFieldType::F32x4 => 16,
        }
    }
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: &'static str, r#type: VertexFieldType) {
        self.fields.push(VertexField { name, r#type });
    }

    pub fn element_stride(&self) -> u32 {
        self.fields.iter().map(|e| e.r#type.stride()).sum()
    }

    /// `(location, name, type, offset)` of each field.
    pub fn attributes(&self) -> impl Iterator<Item = (u32, &'static str, VertexFieldType, u32)> + '_ {
        self.fields.iter().enumerate().scan(0, |offset, (location, field)| {
            let at = *offset;
            *offset += field.r#type.stride();
            Some((location as u32, field.name, field.r#type, at))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub cull: CullMode,
    pub fill: FillMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        RasterizerState {
            cull: CullMode::Back,
            fill: FillMode::Solid,
            front_counter_clockwise: true,
            depth_bias: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write: bool,
    pub compare: CompareFunction,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        DepthStencilState {
            format: TextureFormat::Depth32Float,
            depth_write: true,
            compare: CompareFunction::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// Premultiplied-style source-over blending.
    Alpha,
    Additive,
}

pub struct GraphicsState<B: Backend> {
    pub program: Program,
    pub layout: Arc<RootBindingLayout<B>>,
    pub rasterizer: RasterizerState,
    pub depth_stencil: Option<DepthStencilState>,
    pub blend: BlendMode,
    pub topology: Topology,
    pub vertex_layouts: Vec<VertexLayout>,
    pub color_formats: Vec<TextureFormat>,
}

impl<B: Backend> GraphicsState<B> {
    /// A single-target, back-face culled triangle list with no depth.
    pub fn new(program: Program, layout: Arc<RootBindingLayout<B>>, color_format: TextureFormat) -> Self {
        GraphicsState {
            program,
            layout,
            rasterizer: RasterizerState::default(),
            depth_stencil: None,
            blend: BlendMode::Opaque,
            topology: Topology::TriangleList,
            vertex_layouts: Vec::new(),
            color_formats: vec![color_format],
        }
    }
}

pub struct ComputeState<B: Backend> {
    pub program: Program,
    pub layout: Arc<RootBindingLayout<B>>,
}

/// Shaders invoked together for one kind of geometry hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HitGroup {
    pub name: String,
    pub closest_hit: Option<String>,
    pub any_hit: Option<String>,
    pub intersection: Option<String>,
}

/// A local layout and the shader exports it applies to.
pub struct LocalLayout<B: Backend> {
    pub layout: Arc<RootBindingLayout<B>>,
    pub exports: Vec<String>,
}

pub struct RaytracingState<B: Backend> {
    pub program: Program,
    /// Bound once per dispatch.  Must not be local.
    pub global_layout: Arc<RootBindingLayout<B>>,
    /// Per shader record.  Each must be local.
    pub local_layouts: Vec<LocalLayout<B>>,
    pub hit_groups: Vec<HitGroup>,
    pub max_recursion_depth: u32,
    pub max_payload_size: u32,
    pub max_attribute_size: u32,
}

pub enum PipelineInit<B: Backend> {
    Graphics(GraphicsState<B>),
    Compute(ComputeState<B>),
    Raytracing(RaytracingState<B>),
}

impl<B: Backend> PipelineInit<B> {
    pub fn pipeline_type(&self) -> PipelineType {
        match self {
            PipelineInit::Graphics(_) => PipelineType::Graphics,
            PipelineInit::Compute(_) => PipelineType::Compute,
            PipelineInit::Raytracing(_) => PipelineType::Raytracing,
        }
    }

    pub fn program(&self) -> &Program {
        match self {
            PipelineInit::Graphics(g) => &g.program,
            PipelineInit::Compute(c) => &c.program,
            PipelineInit::Raytracing(r) => &r.program,
        }
    }

    /// The layout bound with this pipeline.  For raytracing, the global layout.
    pub fn root_layout(&self) -> &Arc<RootBindingLayout<B>> {
        match self {
            PipelineInit::Graphics(g) => &g.layout,
            PipelineInit::Compute(c) => &c.layout,
            PipelineInit::Raytracing(r) => &r.global_layout,
        }
    }
}

impl<B: Backend> std::fmt::Debug for PipelineInit<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineInit")
            .field("type", &self.pipeline_type())
            .field("program", &self.program().label())
            .field("layout", &self.root_layout().label())
            .finish_non_exhaustive()
    }
}
