// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shadow descriptor heap.

wgpu has no descriptor heaps; it binds whole bind groups.  The heap is therefore a table of the
wgpu objects each slot refers to, and a bind group is assembled from a run of slots when a table
is bound.  A slot that was never written resolves to a placeholder of the right kind.
*/

use crate::bindings::heap::Pool;
use crate::bindings::layout::DescriptorKind;
use crate::imp::Error;
use std::sync::Arc;

/// What one heap slot refers to.
#[derive(Debug, Clone)]
pub enum HeapView {
    Sampler(wgpu::Sampler),
    Uniform(wgpu::Buffer),
    Storage(wgpu::Buffer),
    Texture(wgpu::TextureView),
    StorageTexture(wgpu::TextureView),
}

/// Objects written in place of missing resources.
#[derive(Debug)]
pub(super) struct Placeholders {
    buffer: wgpu::Buffer,
    texture: wgpu::TextureView,
    storage_texture: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

fn placeholder_view(device: &wgpu::Device, label: &str, usage: wgpu::TextureUsages) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

impl Placeholders {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("placeholder buffer"),
            size: 256,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        Placeholders {
            buffer,
            texture: placeholder_view(device, "placeholder texture", wgpu::TextureUsages::TEXTURE_BINDING),
            storage_texture: placeholder_view(
                device,
                "placeholder storage texture",
                wgpu::TextureUsages::STORAGE_BINDING,
            ),
            sampler: device.create_sampler(&wgpu::SamplerDescriptor::default()),
        }
    }

    /// A view that can stand in for an unwritten slot of `kind`.
    pub(super) fn view(&self, kind: DescriptorKind) -> HeapView {
        match kind {
            DescriptorKind::Sampler => HeapView::Sampler(self.sampler.clone()),
            DescriptorKind::UniformBuffer | DescriptorKind::PushUniform => {
                HeapView::Uniform(self.buffer.clone())
            }
            DescriptorKind::ResourceBuffer | DescriptorKind::RWResourceBuffer => {
                HeapView::Storage(self.buffer.clone())
            }
            DescriptorKind::ResourceTexture => HeapView::Texture(self.texture.clone()),
            DescriptorKind::RWResourceTexture => {
                HeapView::StorageTexture(self.storage_texture.clone())
            }
        }
    }
}

pub(super) struct Tables {
    resources: wasm_safe_mutex::Mutex<Vec<Option<HeapView>>>,
    samplers: wasm_safe_mutex::Mutex<Vec<Option<HeapView>>>,
}

impl Tables {
    fn table(&self, pool: Pool) -> &wasm_safe_mutex::Mutex<Vec<Option<HeapView>>> {
        match pool {
            Pool::Resources => &self.resources,
            Pool::Samplers => &self.samplers,
        }
    }

    pub(super) fn store(&self, pool: Pool, index: u64, view: HeapView) -> Result<(), Error> {
        let mut table = self.table(pool).lock_sync();
        let slot = table
            .get_mut(index as usize)
            .ok_or(Error::BadHandle(index))?;
        *slot = Some(view);
        Ok(())
    }

    /// Copies out `count` slots starting at `first`.
    pub(super) fn run(&self, pool: Pool, first: u64, count: usize) -> Option<Vec<Option<HeapView>>> {
        let table = self.table(pool).lock_sync();
        let first = first as usize;
        table.get(first..first + count).map(|s| s.to_vec())
    }
}

impl std::fmt::Debug for Tables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tables").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct WgpuHeap {
    pub(super) tables: Arc<Tables>,
}

impl WgpuHeap {
    pub(super) fn new(num_descriptors: u32, num_samplers: u32) -> Self {
        WgpuHeap {
            tables: Arc::new(Tables {
                resources: wasm_safe_mutex::Mutex::new(vec![None; num_descriptors as usize]),
                samplers: wasm_safe_mutex::Mutex::new(vec![None; num_samplers as usize]),
            }),
        }
    }
}
