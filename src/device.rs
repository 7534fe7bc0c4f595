// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Cross-backend device.

A [`Device`] owns a backend, the shader-visible [`DescriptorHeap`] every descriptor set is carved
from, and the list of native pipelines retired by [`Pipeline::realize`](crate::pipeline::Pipeline::realize).
All factory operations go through it.

Retired pipelines may still be referenced by work in flight, so they are released only by
[`Device::drain_retired`], which waits for the device to go idle first.
*/

use crate::batch::Batch;
use crate::bindings::descriptor_set::{self, DescriptorSet, DescriptorSetInit, UpdateError};
use crate::bindings::heap::{DescriptorHeap, DescriptorHeapInit};
use crate::bindings::layout::RootBindingLayoutInit;
use crate::bindings::resources::{
    Buffer, BufferInit, BoundObject, Sampler, SamplerInit, Texture, TextureInit,
};
use crate::bindings::root_layout::{LayoutError, RootBindingLayout};
use crate::imp::{self, Backend};
use crate::pipeline::{
    ComputeState, GraphicsState, Pipeline, PipelineInit, RaytracingState, RealizeError,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CreateError {
    #[error("Can't create descriptor heap {0}")]
    Heap(#[source] imp::Error),
}

pub(crate) struct DeviceShared<B: Backend> {
    backend: B,
    heap: DescriptorHeap<B>,
    retired: wasm_safe_mutex::Mutex<Vec<Arc<B::Pipeline>>>,
}

impl<B: Backend> DeviceShared<B> {
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Defers destruction of a native pipeline until the next drain.
    pub(crate) fn retire(&self, pipeline: Arc<B::Pipeline>) {
        self.retired.lock_sync().push(pipeline);
    }
}

/// A backend together with its descriptor heap.  Clones share the same device.
pub struct Device<B: Backend> {
    shared: Arc<DeviceShared<B>>,
}

impl<B: Backend> Clone for Device<B> {
    fn clone(&self) -> Self {
        Device {
            shared: self.shared.clone(),
        }
    }
}

impl<B: Backend> Device<B> {
    pub fn new(backend: B, heap: DescriptorHeapInit) -> Result<Self, CreateError> {
        let heap = DescriptorHeap::new(&backend, heap).map_err(CreateError::Heap)?;
        logwise::info_sync!(
            "Created device on {backend} backend",
            backend = backend.name().to_string()
        );
        Ok(Device {
            shared: Arc::new(DeviceShared {
                backend,
                heap,
                retired: wasm_safe_mutex::Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    /// The heap descriptor sets are allocated from.
    pub fn heap(&self) -> &DescriptorHeap<B> {
        &self.shared.heap
    }

    pub fn create_root_descriptor_layout(
        &self,
        init: RootBindingLayoutInit,
    ) -> Result<Arc<RootBindingLayout<B>>, LayoutError> {
        RootBindingLayout::new(&self.shared.backend, init).map(Arc::new)
    }

    /**
    Creates a standalone heap, separate from the device heap.

    Descriptor sets and batches always use the device heap, see [`Device::heap`].  A standalone
    heap is for ranges managed by hand through [`DescriptorHeap::allocate`] and its handle
    arithmetic, and for sizing a heap before committing to it.
    */
    pub fn create_descriptor_heap(
        &self,
        init: DescriptorHeapInit,
    ) -> Result<DescriptorHeap<B>, imp::Error> {
        DescriptorHeap::new(&self.shared.backend, init)
    }

    pub fn create_descriptor_set(
        &self,
        init: DescriptorSetInit<B>,
    ) -> Result<DescriptorSet<B>, descriptor_set::CreateError> {
        DescriptorSet::allocate(&self.shared.heap, init)
    }

    /// Writes `objects` into `set`, replacing the objects it retains.
    pub fn update_descriptor_set(
        &self,
        set: &DescriptorSet<B>,
        objects: Vec<BoundObject<B>>,
    ) -> Result<(), UpdateError> {
        set.write(&self.shared.backend, &self.shared.heap, objects)
    }

    pub fn create_graphics_pipeline_state(
        &self,
        label: impl Into<String>,
        state: GraphicsState<B>,
    ) -> Result<Pipeline<B>, RealizeError> {
        Pipeline::new(self.shared.clone(), label.into(), PipelineInit::Graphics(state))
    }

    pub fn create_compute_pipeline_state(
        &self,
        label: impl Into<String>,
        state: ComputeState<B>,
    ) -> Result<Pipeline<B>, RealizeError> {
        Pipeline::new(self.shared.clone(), label.into(), PipelineInit::Compute(state))
    }

    pub fn create_raytracing_pipeline_state(
        &self,
        label: impl Into<String>,
        state: RaytracingState<B>,
    ) -> Result<Pipeline<B>, RealizeError> {
        Pipeline::new(self.shared.clone(), label.into(), PipelineInit::Raytracing(state))
    }

    pub fn create_buffer(&self, init: BufferInit) -> Result<Buffer<B>, imp::Error> {
        let native = self.shared.backend.create_buffer(&init)?;
        Ok(Buffer::new(init, native))
    }

    pub fn create_texture(&self, init: TextureInit) -> Result<Texture<B>, imp::Error> {
        let native = self.shared.backend.create_texture(&init)?;
        Ok(Texture::new(init, native))
    }

    pub fn create_sampler(&self, init: SamplerInit) -> Result<Sampler<B>, imp::Error> {
        let native = self.shared.backend.create_sampler(&init)?;
        Ok(Sampler::new(init, native))
    }

    /// Starts recording bind calls.  The device heap is bound first.
    pub fn begin_batch(&self) -> Batch<B> {
        Batch::new(self.clone())
    }

    /// Number of native pipelines waiting for the next drain.
    pub fn retired_count(&self) -> usize {
        self.shared.retired.lock_sync().len()
    }

    /**
    Waits for the device to go idle, then releases every retired native pipeline.

    Returns how many were released.
    */
    pub fn drain_retired(&self) -> usize {
        let drain = logwise::perfwarn_begin!("drain_retired");
        self.shared.backend.wait_idle();
        let retired = std::mem::take(&mut *self.shared.retired.lock_sync());
        let count = retired.len();
        drop(retired);
        drop(drain);
        logwise::trace_sync!("Released {count} retired pipelines", count = count);
        count
    }
}

impl<B: Backend> std::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.shared.backend)
            .field("heap", &self.shared.heap)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> PartialEq for Device<B> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<B: Backend> Eq for Device<B> {}
