// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Backend interface.

Every native API is reached through [`Backend`].  A backend owns the native device and creates
the native objects the rest of the crate wraps; a [`CommandRecorder`] receives the bind calls
issued by a [`Batch`](crate::batch::Batch).

Two backends ship with the crate:

* [`SoftBackend`], a headless reference device that keeps heaps and root layouts in memory
* `WgpuBackend` (feature `backend_wgpu`), which drives wgpu
*/

use crate::bindings::heap::{CpuHandle, DescriptorHeapInit, GpuHandle, Pool};
use crate::bindings::layout::{DescriptorKind, PipelineType};
use crate::bindings::resources::{BufferInit, SamplerInit, TextureInit, ViewDesc};
use crate::bindings::translate::{RootLayoutDesc, TableStrategy};
use crate::pipeline::PipelineInit;
use crate::shaders::LinkedProgram;
use std::fmt::Debug;
use std::sync::Arc;

mod error;
pub mod soft;

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub mod wgpu;

pub use error::Error;
pub use soft::SoftBackend;

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub use self::wgpu::WgpuBackend;

/// Everything a backend needs to build one native pipeline.
#[derive(Debug)]
pub struct PipelineDesc<'a, B: Backend> {
    pub label: &'a str,
    pub init: &'a PipelineInit<B>,
    pub program: &'a LinkedProgram,
}

pub trait Backend: Debug + Send + Sync + Sized + 'static {
    type Heap: Debug + Send + Sync;
    type RootLayout: Debug + Send + Sync;
    type Pipeline: Debug + Send + Sync;
    type Buffer: Debug + Send + Sync;
    type Texture: Debug + Send + Sync;
    type Sampler: Debug + Send + Sync;
    type Recorder: CommandRecorder<Self>;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Selects how descriptor set slots are translated into tables.
    fn table_strategy(&self) -> TableStrategy;

    /// Per-descriptor stride of a heap pool.
    fn increment(&self, pool: Pool) -> u32;

    fn create_heap(&self, init: &DescriptorHeapInit) -> Result<Self::Heap, Error>;

    /// CPU and GPU addresses of the first descriptor of `pool`.
    fn heap_bases(&self, heap: &Self::Heap, pool: Pool) -> (CpuHandle, GpuHandle);

    fn create_root_layout(&self, desc: &RootLayoutDesc) -> Result<Self::RootLayout, Error>;

    /// Checks that `view` can be written into an element of `kind`, before anything is written.
    fn check_view(&self, kind: DescriptorKind, view: &ViewDesc<'_, Self>) -> Result<(), Error> {
        let _ = (kind, view);
        Ok(())
    }

    /// Creates a view in place at `at`.
    fn write_view(
        &self,
        heap: &Self::Heap,
        pool: Pool,
        at: CpuHandle,
        view: ViewDesc<'_, Self>,
    ) -> Result<(), Error>;

    fn create_pipeline(&self, desc: PipelineDesc<'_, Self>) -> Result<Self::Pipeline, Error>;

    fn create_buffer(&self, init: &BufferInit) -> Result<Self::Buffer, Error>;
    fn create_texture(&self, init: &TextureInit) -> Result<Self::Texture, Error>;
    fn create_sampler(&self, init: &SamplerInit) -> Result<Self::Sampler, Error>;

    fn create_recorder(&self, heap: &Self::Heap) -> Self::Recorder;

    /// Blocks until all submitted GPU work is complete.
    fn wait_idle(&self);
}

/// Receives native bind calls, in order.
pub trait CommandRecorder<B: Backend>: Debug + Send {
    fn set_descriptor_heaps(&mut self, heap: &B::Heap);
    fn set_root_layout(&mut self, ty: PipelineType, layout: &Arc<B::RootLayout>);
    fn set_pipeline(&mut self, ty: PipelineType, pipeline: &Arc<B::Pipeline>);
    fn set_descriptor_table(&mut self, ty: PipelineType, root_index: u32, table: GpuHandle);
    /// `data` is a whole number of 32-bit values.
    fn set_constants(&mut self, ty: PipelineType, root_index: u32, data: &[u8]);
}
