// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The wgpu backend.

wgpu binds bind groups rather than descriptor tables, so this backend translates with the
per-slot strategy and keeps a shadow heap: each heap slot records the wgpu object written there,
and binding a table assembles a bind group from the slots it spans.  Push entries become push
constants when the adapter supports them.

Raytracing is not available through wgpu and is reported as [`Error::Unsupported`].
*/

mod heap;
mod layout;
mod pipeline;
mod recorder;
mod sampler;

pub use heap::{HeapView, WgpuHeap};
pub use layout::{RootSlot, WgpuRootLayout};
pub use pipeline::WgpuPipeline;
pub use recorder::{WgpuCommand, WgpuRecorder};

use crate::bindings::heap::{CpuHandle, DescriptorHeapInit, GpuHandle, Pool};
use crate::bindings::layout::DescriptorKind;
use crate::bindings::resources::{
    BufferInit, BufferUsage, SamplerInit, TextureFormat, TextureInit, TextureUsage, ViewDesc,
};
use crate::bindings::translate::{RootLayoutDesc, TableStrategy};
use crate::imp::{Backend, Error, PipelineDesc};
use heap::Placeholders;
use std::sync::Arc;

const RESOURCE_BASE: u64 = 0x1_0000_0000;
const SAMPLER_BASE: u64 = 0x2_0000_0000;

/// Runs `create` inside a validation error scope, so a bad descriptor becomes an error instead of
/// reaching wgpu's uncaptured error handler.
pub(crate) fn validated<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> Result<T, Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match test_executors::spin_on(device.pop_error_scope()) {
        Some(e) => Err(Error::Validation(e.to_string())),
        None => Ok(value),
    }
}

/// Shadow heap slots are addressed by index, so both kinds of handle share one base per pool.
fn gpu_base(pool: Pool) -> GpuHandle {
    match pool {
        Pool::Resources => GpuHandle(RESOURCE_BASE),
        Pool::Samplers => GpuHandle(SAMPLER_BASE),
    }
}

#[derive(Debug)]
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    push_constants: bool,
    placeholders: Arc<Placeholders>,
}

impl WgpuBackend {
    /// Picks the default adapter and creates a device on it.
    pub async fn new() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let options = wgpu::RequestAdapterOptions {
            power_preference: Default::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        };
        let adapter = instance
            .request_adapter(&options)
            .await
            .map_err(|e| Error::NoSuchAdapter(e.to_string()))?;

        let mut required_features = wgpu::Features::empty();
        let mut limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
        if adapter.features().contains(wgpu::Features::PUSH_CONSTANTS) {
            required_features |= wgpu::Features::PUSH_CONSTANTS;
            limits.max_push_constant_size = adapter.limits().max_push_constant_size;
        }
        let descriptor = wgpu::DeviceDescriptor {
            label: Some("roots_and_heaps"),
            required_features,
            required_limits: limits,
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        };
        let (device, queue) = adapter
            .request_device(&descriptor)
            .await
            .map_err(|e| Error::RequestDevice(e.to_string()))?;
        logwise::info_sync!(
            "wgpu device on {adapter}",
            adapter = adapter.get_info().name
        );
        Ok(Self::from_device(device, queue))
    }

    /// Wraps a device created elsewhere.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let push_constants = device.features().contains(wgpu::Features::PUSH_CONSTANTS);
        if !push_constants {
            logwise::warn_sync!("Device has no push constants; layouts with push entries will fail");
        }
        let placeholders = Arc::new(Placeholders::new(&device));
        WgpuBackend {
            device,
            queue,
            push_constants,
            placeholders,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn placeholders(&self) -> &Arc<Placeholders> {
        &self.placeholders
    }
}

impl Backend for WgpuBackend {
    type Heap = WgpuHeap;
    type RootLayout = WgpuRootLayout;
    type Pipeline = WgpuPipeline;
    type Buffer = wgpu::Buffer;
    type Texture = WgpuTexture;
    type Sampler = wgpu::Sampler;
    type Recorder = WgpuRecorder;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn table_strategy(&self) -> TableStrategy {
        TableStrategy::PerSlot
    }

    fn increment(&self, _pool: Pool) -> u32 {
        1
    }

    fn create_heap(&self, init: &DescriptorHeapInit) -> Result<WgpuHeap, Error> {
        Ok(WgpuHeap::new(init.num_descriptors, init.num_samplers))
    }

    fn heap_bases(&self, _heap: &WgpuHeap, pool: Pool) -> (CpuHandle, GpuHandle) {
        let base = gpu_base(pool);
        (CpuHandle(base.0), base)
    }

    fn create_root_layout(&self, desc: &RootLayoutDesc) -> Result<WgpuRootLayout, Error> {
        layout::create_root_layout(&self.device, self.push_constants, desc)
    }

    fn check_view(&self, kind: DescriptorKind, view: &ViewDesc<'_, Self>) -> Result<(), Error> {
        let incompatible = |reason: String| {
            Err(Error::IncompatibleView {
                kind,
                reason,
                backend: "wgpu",
            })
        };
        match view {
            ViewDesc::UnorderedAccessTexture(Some((_, init)))
                if pipeline::texture_format(init.format) != layout::STORAGE_TEXTURE_FORMAT =>
            {
                incompatible(format!(
                    "{:?} can't be written through a {:?} storage binding",
                    init.format,
                    layout::STORAGE_TEXTURE_FORMAT
                ))
            }
            ViewDesc::ShaderResourceTexture(Some((_, init)))
                if init.format == TextureFormat::Depth32Float =>
            {
                incompatible("depth textures can't be bound as filterable textures".to_string())
            }
            _ => Ok(()),
        }
    }

    fn write_view(
        &self,
        heap: &WgpuHeap,
        pool: Pool,
        at: CpuHandle,
        view: ViewDesc<'_, Self>,
    ) -> Result<(), Error> {
        let index = at
            .0
            .checked_sub(gpu_base(pool).0)
            .ok_or(Error::BadHandle(at.0))?;
        let placeholder = |kind| self.placeholders.view(kind);
        let view = match view {
            ViewDesc::Sampler(s) => HeapView::Sampler(s.clone()),
            ViewDesc::ConstantBuffer(b, _) => HeapView::Uniform(b.clone()),
            ViewDesc::ShaderResourceBuffer(b) => match b {
                Some((b, _)) => HeapView::Storage(b.clone()),
                None => placeholder(DescriptorKind::ResourceBuffer),
            },
            ViewDesc::UnorderedAccessBuffer(b) => match b {
                Some((b, _)) => HeapView::Storage(b.clone()),
                None => placeholder(DescriptorKind::RWResourceBuffer),
            },
            ViewDesc::ShaderResourceTexture(t) => match t {
                Some((t, _)) => HeapView::Texture(t.view.clone()),
                None => placeholder(DescriptorKind::ResourceTexture),
            },
            ViewDesc::UnorderedAccessTexture(t) => match t {
                Some((t, _)) => HeapView::StorageTexture(t.view.clone()),
                None => placeholder(DescriptorKind::RWResourceTexture),
            },
        };
        heap.tables.store(pool, index, view)
    }

    fn create_pipeline(&self, desc: PipelineDesc<'_, Self>) -> Result<WgpuPipeline, Error> {
        pipeline::create_pipeline(self, desc)
    }

    fn create_buffer(&self, init: &BufferInit) -> Result<wgpu::Buffer, Error> {
        let usage = match init.usage {
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferUsage::ShaderRead | BufferUsage::ShaderReadWrite => wgpu::BufferUsages::STORAGE,
        };
        validated(&self.device, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&init.label),
                size: init.size.max(4).next_multiple_of(4),
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
    }

    fn create_texture(&self, init: &TextureInit) -> Result<WgpuTexture, Error> {
        init.check()?;
        let usage = match init.usage {
            TextureUsage::Sampled => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
            TextureUsage::Storage => {
                wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING
            }
        };
        validated(&self.device, || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&init.label),
                size: wgpu::Extent3d {
                    width: init.width,
                    height: init.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: pipeline::texture_format(init.format),
                usage,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            WgpuTexture { texture, view }
        })
    }

    fn create_sampler(&self, init: &SamplerInit) -> Result<wgpu::Sampler, Error> {
        Ok(sampler::create_sampler(&self.device, init))
    }

    fn create_recorder(&self, heap: &WgpuHeap) -> WgpuRecorder {
        WgpuRecorder::new(self, heap)
    }

    fn wait_idle(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Wait) {
            logwise::warn_sync!("Device poll failed: {error}", error = e.to_string());
        }
    }
}
