// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render and compute pipelines.

use crate::bindings::resources::TextureFormat;
use crate::imp::Error;
use crate::imp::wgpu::WgpuBackend;
use crate::imp::PipelineDesc;
use crate::pipeline::state::{
    BlendMode, CompareFunction, CullMode, FillMode, GraphicsState, Topology, VertexFieldType,
};
use crate::pipeline::{ComputeState, PipelineInit};
use crate::shaders::{CompiledShader, LinkedProgram, ShaderStage};
use std::borrow::Cow;

#[derive(Debug)]
pub enum WgpuPipeline {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

pub(super) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn vertex_format(ty: VertexFieldType) -> wgpu::VertexFormat {
    match ty {
        VertexFieldType::F32 => wgpu::VertexFormat::Float32,
        VertexFieldType::F32x2 => wgpu::VertexFormat::Float32x2,
        VertexFieldType::F32x3 => wgpu::VertexFormat::Float32x3,
        VertexFieldType::F32x4 => wgpu::VertexFormat::Float32x4,
        VertexFieldType::U32 => wgpu::VertexFormat::Uint32,
    }
}

fn compare(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn blend(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Opaque => None,
        BlendMode::Alpha => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        BlendMode::Additive => {
            let add = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            Some(wgpu::BlendState {
                color: add,
                alpha: add,
            })
        }
    }
}

fn topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::PointList => wgpu::PrimitiveTopology::PointList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn required_stage<'a>(
    program: &'a LinkedProgram,
    stage: ShaderStage,
) -> Result<&'a CompiledShader, Error> {
    program.stage(stage).ok_or_else(|| {
        Error::Pipeline(format!(
            "program {} has no {stage:?} stage",
            program.label()
        ))
    })
}

fn module(device: &wgpu::Device, label: &str, shader: &CompiledShader) -> Result<wgpu::ShaderModule, Error> {
    let source = std::str::from_utf8(shader.code())
        .map_err(|e| Error::Pipeline(format!("{label}: shader is not WGSL text: {e}")))?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    }))
}

fn render_pipeline(
    backend: &WgpuBackend,
    label: &str,
    state: &GraphicsState<WgpuBackend>,
    program: &LinkedProgram,
) -> Result<wgpu::RenderPipeline, Error> {
    let device = backend.device();
    let vertex_shader = required_stage(program, ShaderStage::Vertex)?;
    let vertex_module = module(device, label, vertex_shader)?;
    let fragment = match program.stage(ShaderStage::Fragment) {
        Some(shader) => Some((shader, module(device, label, shader)?)),
        None => None,
    };

    let attributes: Vec<Vec<wgpu::VertexAttribute>> = state
        .vertex_layouts
        .iter()
        .map(|layout| {
            layout
                .attributes()
                .map(|(location, _name, ty, offset)| wgpu::VertexAttribute {
                    format: vertex_format(ty),
                    offset: offset as u64,
                    shader_location: location,
                })
                .collect()
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = state
        .vertex_layouts
        .iter()
        .zip(&attributes)
        .map(|(layout, attributes)| wgpu::VertexBufferLayout {
            array_stride: layout.element_stride() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();
    let targets: Vec<Option<wgpu::ColorTargetState>> = state
        .color_formats
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: texture_format(*format),
                blend: blend(state.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    let rasterizer = state.rasterizer;
    let primitive = wgpu::PrimitiveState {
        topology: topology(state.topology),
        strip_index_format: None,
        front_face: if rasterizer.front_counter_clockwise {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        },
        cull_mode: match rasterizer.cull {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        unclipped_depth: false,
        polygon_mode: match rasterizer.fill {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe => wgpu::PolygonMode::Line,
        },
        conservative: false,
    };
    let depth_stencil = state.depth_stencil.map(|ds| wgpu::DepthStencilState {
        format: texture_format(ds.format),
        depth_write_enabled: ds.depth_write,
        depth_compare: compare(ds.compare),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState {
            constant: rasterizer.depth_bias,
            slope_scale: 0.0,
            clamp: 0.0,
        },
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&state.layout.native().pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(vertex_shader.entry_point()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        primitive,
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        fragment: fragment
            .as_ref()
            .map(|(shader, module)| wgpu::FragmentState {
                module,
                entry_point: Some(shader.entry_point()),
                compilation_options: Default::default(),
                targets: &targets,
            }),
        multiview: None,
        cache: None,
    }))
}

fn compute_pipeline(
    backend: &WgpuBackend,
    label: &str,
    state: &ComputeState<WgpuBackend>,
    program: &LinkedProgram,
) -> Result<wgpu::ComputePipeline, Error> {
    let device = backend.device();
    let shader = required_stage(program, ShaderStage::Compute)?;
    let module = module(device, label, shader)?;
    Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&state.layout.native().pipeline_layout),
        module: &module,
        entry_point: Some(shader.entry_point()),
        compilation_options: Default::default(),
        cache: None,
    }))
}

pub(super) fn create_pipeline(
    backend: &WgpuBackend,
    desc: PipelineDesc<'_, WgpuBackend>,
) -> Result<WgpuPipeline, Error> {
    let device = backend.device();
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let built = match desc.init {
        PipelineInit::Graphics(state) => {
            render_pipeline(backend, desc.label, state, desc.program).map(WgpuPipeline::Render)
        }
        PipelineInit::Compute(state) => {
            compute_pipeline(backend, desc.label, state, desc.program).map(WgpuPipeline::Compute)
        }
        PipelineInit::Raytracing(_) => Err(Error::Unsupported {
            feature: "raytracing",
            backend: "wgpu",
        }),
    };
    //pop even when building failed, so scopes stay balanced
    let validation = test_executors::spin_on(device.pop_error_scope());
    let pipeline = built?;
    match validation {
        Some(e) => Err(Error::Pipeline(e.to_string())),
        None => Ok(pipeline),
    }
}
