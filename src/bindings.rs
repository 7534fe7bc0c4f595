/*! Defines binding types: layouts, the descriptor heap, descriptor sets and the objects written into them */

pub mod stages;
pub mod layout;
pub(crate) mod index_allocator;
pub mod heap;
pub mod translate;
pub mod root_layout;
pub mod descriptor_set;
pub mod resources;

pub use stages::{Stages, Visibility};
pub use layout::{
    DescriptorKind, DescriptorLayoutEntry, DescriptorSetLayout, LayoutSlot, PipelineType,
    RootBindingLayoutInit,
};
pub use heap::{AllocError, CpuHandle, DescriptorHeap, DescriptorHeapInit, GpuHandle, HeapUsage, Pool};
pub use translate::{DescriptorRange, RangeClass, RootLayoutDesc, RootParameter, SlotTable, TableStrategy};
pub use root_layout::{LayoutError, RootBindingLayout, SlotInfo};
pub use descriptor_set::{DescriptorSet, DescriptorSetInit, TableHandle, UpdateError};
pub use resources::{
    AddressMode, BoundObject, Buffer, BufferInit, BufferUsage, Sampler, SamplerInit, SamplerType,
    Texture, TextureFormat, TextureInit, TextureUsage,
};
