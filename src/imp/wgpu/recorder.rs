// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Recording bind calls for later replay into a wgpu pass.

Descriptor tables are resolved into bind groups when they are bound, from whatever the shadow
heap holds at that moment.
*/

use crate::bindings::heap::{GpuHandle, Pool};
use crate::bindings::layout::PipelineType;
use crate::imp::{CommandRecorder, Error};
use crate::imp::wgpu::heap::{HeapView, Placeholders, Tables, WgpuHeap};
use crate::imp::wgpu::layout::{RootSlot, WgpuRootLayout};
use crate::imp::wgpu::pipeline::WgpuPipeline;
use crate::imp::wgpu::{WgpuBackend, gpu_base, validated};
use std::sync::Arc;

#[derive(Debug)]
pub enum WgpuCommand {
    SetPipeline {
        ty: PipelineType,
        pipeline: Arc<WgpuPipeline>,
    },
    SetBindGroup {
        ty: PipelineType,
        index: u32,
        group: wgpu::BindGroup,
    },
    SetPushConstants {
        ty: PipelineType,
        stages: wgpu::ShaderStages,
        offset: u32,
        data: Vec<u8>,
    },
}

#[derive(Debug)]
pub struct WgpuRecorder {
    device: wgpu::Device,
    tables: Arc<Tables>,
    placeholders: Arc<Placeholders>,
    layouts: [Option<Arc<WgpuRootLayout>>; 3],
    commands: Vec<WgpuCommand>,
}

fn type_index(ty: PipelineType) -> usize {
    match ty {
        PipelineType::Graphics => 0,
        PipelineType::Compute => 1,
        PipelineType::Raytracing => 2,
    }
}

impl WgpuRecorder {
    pub(super) fn new(backend: &WgpuBackend, heap: &WgpuHeap) -> Self {
        WgpuRecorder {
            device: backend.device().clone(),
            tables: heap.tables.clone(),
            placeholders: backend.placeholders().clone(),
            layouts: [None, None, None],
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[WgpuCommand] {
        &self.commands
    }

    fn bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        pool: Pool,
        elements: &[crate::bindings::layout::DescriptorKind],
        table: GpuHandle,
    ) -> Result<wgpu::BindGroup, Error> {
        let run = table
            .0
            .checked_sub(gpu_base(pool).0)
            .and_then(|first| self.tables.run(pool, first, elements.len()))
            .ok_or(Error::BadHandle(table.0))?;
        let views: Vec<HeapView> = run
            .into_iter()
            .zip(elements)
            .map(|(view, kind)| view.unwrap_or_else(|| self.placeholders.view(*kind)))
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: match view {
                    HeapView::Sampler(s) => wgpu::BindingResource::Sampler(s),
                    HeapView::Uniform(b) | HeapView::Storage(b) => b.as_entire_binding(),
                    HeapView::Texture(v) | HeapView::StorageTexture(v) => {
                        wgpu::BindingResource::TextureView(v)
                    }
                },
            })
            .collect();
        validated(&self.device, || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout,
                entries: &entries,
            })
        })
    }

    /// Replays the graphics commands into `pass`.
    pub fn encode_render(&self, pass: &mut wgpu::RenderPass<'_>) {
        for command in &self.commands {
            match command {
                WgpuCommand::SetPipeline {
                    ty: PipelineType::Graphics,
                    pipeline,
                } => {
                    if let WgpuPipeline::Render(p) = pipeline.as_ref() {
                        pass.set_pipeline(p);
                    }
                }
                WgpuCommand::SetBindGroup {
                    ty: PipelineType::Graphics,
                    index,
                    group,
                } => pass.set_bind_group(*index, group, &[]),
                WgpuCommand::SetPushConstants {
                    ty: PipelineType::Graphics,
                    stages,
                    offset,
                    data,
                } => pass.set_push_constants(*stages, *offset, data),
                _ => {}
            }
        }
    }

    /// Replays the compute commands into `pass`.
    pub fn encode_compute(&self, pass: &mut wgpu::ComputePass<'_>) {
        for command in &self.commands {
            match command {
                WgpuCommand::SetPipeline {
                    ty: PipelineType::Compute,
                    pipeline,
                } => {
                    if let WgpuPipeline::Compute(p) = pipeline.as_ref() {
                        pass.set_pipeline(p);
                    }
                }
                WgpuCommand::SetBindGroup {
                    ty: PipelineType::Compute,
                    index,
                    group,
                } => pass.set_bind_group(*index, group, &[]),
                WgpuCommand::SetPushConstants {
                    ty: PipelineType::Compute,
                    offset,
                    data,
                    ..
                } => pass.set_push_constants(*offset, data),
                _ => {}
            }
        }
    }
}

impl CommandRecorder<WgpuBackend> for WgpuRecorder {
    fn set_descriptor_heaps(&mut self, _heap: &WgpuHeap) {
        //the shadow tables were captured at creation
    }

    fn set_root_layout(&mut self, ty: PipelineType, layout: &Arc<WgpuRootLayout>) {
        self.layouts[type_index(ty)] = Some(layout.clone());
    }

    fn set_pipeline(&mut self, ty: PipelineType, pipeline: &Arc<WgpuPipeline>) {
        self.commands.push(WgpuCommand::SetPipeline {
            ty,
            pipeline: pipeline.clone(),
        });
    }

    fn set_descriptor_table(&mut self, ty: PipelineType, root_index: u32, table: GpuHandle) {
        let Some(layout) = self.layouts[type_index(ty)].clone() else {
            logwise::error_sync!("Descriptor table bound with no root layout");
            return;
        };
        let Some(RootSlot::Group {
            index,
            layout: group_layout,
            pool,
            elements,
        }) = layout.slots.get(root_index as usize)
        else {
            logwise::error_sync!(
                "Root parameter {root_index} is not a table",
                root_index = root_index
            );
            return;
        };
        match self.bind_group(group_layout, *pool, elements, table) {
            Ok(group) => self.commands.push(WgpuCommand::SetBindGroup {
                ty,
                index: *index,
                group,
            }),
            Err(e) => logwise::error_sync!(
                "Can't bind table {handle}: {error}",
                handle = table.0,
                error = e.to_string()
            ),
        }
    }

    fn set_constants(&mut self, ty: PipelineType, root_index: u32, data: &[u8]) {
        let Some(layout) = self.layouts[type_index(ty)].as_ref() else {
            logwise::error_sync!("Constants bound with no root layout");
            return;
        };
        let Some(RootSlot::Push { offset, .. }) = layout.slots.get(root_index as usize) else {
            logwise::error_sync!(
                "Root parameter {root_index} is not a constant",
                root_index = root_index
            );
            return;
        };
        let command = WgpuCommand::SetPushConstants {
            ty,
            stages: layout.push_stages,
            offset: *offset,
            data: data.to_vec(),
        };
        self.commands.push(command);
    }
}
