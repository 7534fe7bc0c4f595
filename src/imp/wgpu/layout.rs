// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Root layouts as wgpu pipeline layouts.

Every table parameter becomes a bind group layout, in root parameter order, so bind group `n` is
the `n`th table.  Inside a group, an element's binding number is its offset within the table.

Constant parameters share one push constant range.  wgpu allows each stage in at most one range,
so the constants are laid out back to back and the range is visible to the union of their
stages.
*/

use crate::bindings::heap::Pool;
use crate::bindings::layout::{DescriptorKind, PipelineType};
use crate::bindings::stages::Visibility;
use crate::bindings::translate::{RootLayoutDesc, RootParameter};
use crate::imp::Error;

const BACKEND: &str = "wgpu";

/// Format of every storage texture binding.
pub(super) const STORAGE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// How one root parameter is expressed in wgpu.
#[derive(Debug)]
pub enum RootSlot {
    Push {
        offset: u32,
        size: u32,
    },
    Group {
        index: u32,
        layout: wgpu::BindGroupLayout,
        pool: Pool,
        /// Kind of each element, in table order.
        elements: Vec<DescriptorKind>,
    },
}

enum Planned {
    Push {
        offset: u32,
        size: u32,
    },
    Group {
        pool: Pool,
        entries: Vec<wgpu::BindGroupLayoutEntry>,
        elements: Vec<DescriptorKind>,
    },
}

#[derive(Debug)]
pub struct WgpuRootLayout {
    pub(super) pipeline_layout: wgpu::PipelineLayout,
    pub(super) slots: Vec<RootSlot>,
    pub(super) push_stages: wgpu::ShaderStages,
    pub(super) pipeline_type: PipelineType,
}

pub(super) fn shader_stages(visibility: Visibility, ty: PipelineType) -> Result<wgpu::ShaderStages, Error> {
    match (ty, visibility) {
        (PipelineType::Compute, _) => Ok(wgpu::ShaderStages::COMPUTE),
        (PipelineType::Raytracing, _) => Err(Error::Unsupported {
            feature: "raytracing",
            backend: BACKEND,
        }),
        (PipelineType::Graphics, Visibility::All) => Ok(wgpu::ShaderStages::VERTEX_FRAGMENT),
        (PipelineType::Graphics, Visibility::Vertex) => Ok(wgpu::ShaderStages::VERTEX),
        (PipelineType::Graphics, Visibility::Fragment) => Ok(wgpu::ShaderStages::FRAGMENT),
        (PipelineType::Graphics, Visibility::Hull | Visibility::Domain | Visibility::Geometry) => {
            Err(Error::Unsupported {
                feature: "tessellation and geometry stages",
                backend: BACKEND,
            })
        }
    }
}

fn binding_type(kind: DescriptorKind) -> Result<wgpu::BindingType, Error> {
    let buffer = |ty| wgpu::BindingType::Buffer {
        ty,
        has_dynamic_offset: false,
        min_binding_size: None,
    };
    Ok(match kind {
        DescriptorKind::Sampler => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        }
        DescriptorKind::UniformBuffer => buffer(wgpu::BufferBindingType::Uniform),
        DescriptorKind::ResourceBuffer => {
            buffer(wgpu::BufferBindingType::Storage { read_only: true })
        }
        DescriptorKind::RWResourceBuffer => {
            buffer(wgpu::BufferBindingType::Storage { read_only: false })
        }
        DescriptorKind::ResourceTexture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        DescriptorKind::RWResourceTexture => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: STORAGE_TEXTURE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        DescriptorKind::PushUniform => {
            return Err(Error::Serialize(
                "push uniforms can't be placed in a table".to_string(),
            ));
        }
    })
}

pub(super) fn create_root_layout(
    device: &wgpu::Device,
    push_constants: bool,
    desc: &RootLayoutDesc,
) -> Result<WgpuRootLayout, Error> {
    let ty = desc.pipeline_type;
    if ty == PipelineType::Raytracing {
        return Err(Error::Unsupported {
            feature: "raytracing",
            backend: BACKEND,
        });
    }
    //no early returns once the error scope is open
    let mut planned = Vec::with_capacity(desc.parameters.len());
    let mut push_size = 0;
    let mut push_stages = wgpu::ShaderStages::NONE;
    for parameter in &desc.parameters {
        match parameter {
            RootParameter::Constants {
                num_values,
                visibility,
                ..
            } => {
                if !push_constants {
                    return Err(Error::Unsupported {
                        feature: "push constants",
                        backend: BACKEND,
                    });
                }
                let size = num_values * 4;
                planned.push(Planned::Push {
                    offset: push_size,
                    size,
                });
                push_size += size;
                push_stages |= shader_stages(*visibility, ty)?;
            }
            RootParameter::Table {
                pool,
                ranges,
                visibility,
            } => {
                let stages = shader_stages(*visibility, ty)?;
                let mut entries = Vec::new();
                let mut elements = Vec::new();
                for range in ranges {
                    for i in 0..range.count {
                        entries.push(wgpu::BindGroupLayoutEntry {
                            binding: range.offset + i,
                            visibility: stages,
                            ty: binding_type(range.kind)?,
                            count: None,
                        });
                        elements.push(range.kind);
                    }
                }
                planned.push(Planned::Group {
                    pool: *pool,
                    entries,
                    elements,
                });
            }
        }
    }

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut slots = Vec::with_capacity(planned.len());
    let mut group_layouts = Vec::new();
    for (root_index, plan) in planned.into_iter().enumerate() {
        match plan {
            Planned::Push { offset, size } => slots.push(RootSlot::Push { offset, size }),
            Planned::Group {
                pool,
                entries,
                elements,
            } => {
                let label = format!("{} table {root_index}", desc.label);
                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&label),
                    entries: &entries,
                });
                group_layouts.push(layout.clone());
                slots.push(RootSlot::Group {
                    index: group_layouts.len() as u32 - 1,
                    layout,
                    pool,
                    elements,
                });
            }
        }
    }

    let push_constant_ranges = if push_size > 0 {
        vec![wgpu::PushConstantRange {
            stages: push_stages,
            range: 0..push_size,
        }]
    } else {
        Vec::new()
    };
    let group_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&desc.label),
        bind_group_layouts: &group_refs,
        push_constant_ranges: &push_constant_ranges,
    });
    if let Some(e) = test_executors::spin_on(device.pop_error_scope()) {
        return Err(Error::Serialize(e.to_string()));
    }
    Ok(WgpuRootLayout {
        pipeline_layout,
        slots,
        push_stages,
        pipeline_type: ty,
    })
}
