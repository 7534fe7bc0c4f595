/*! roots_and_heaps is the resource binding and live reload layer of a cross-backend GPU middleware.

It sits between a renderer, which thinks in terms of "this shader reads a uniform buffer and two
textures", and native APIs, which think in root parameters, descriptor ranges and descriptor heaps.

| Concept               | You describe                                   | The crate produces                                   |
|-----------------------|------------------------------------------------|------------------------------------------------------|
| Root binding layout   | push entries, descriptor set layouts, samplers | native root layout, root parameter index per slot    |
| Descriptor heap       | pool sizes                                     | append-only CPU/GPU handle ranges                    |
| Descriptor set        | a layout slot                                  | a contiguous heap range holding concrete views       |
| Pipeline              | program + fixed-function state + root layout   | a native pipeline that can be rebuilt in place       |
| Watcher               | shader source files                            | recompile → relink → realize when a file changes     |
| Batch                 | bind calls                                     | native bind calls, with everything bound kept alive  |

# Root parameter order

Root parameters are emitted in a fixed order: push entries first, then the tables of each
descriptor set slot in declaration order, then the sampler table.  Descriptor sets and batches
rely on this order to find which root parameter a slot binds through.

# Live reload

Pipelines keep their identity for their whole life.  When a watched shader file changes, the
shader recompiles, every program using it relinks, and every pipeline built from those programs
realizes a new native object.  Failures at any step keep the last good state and are logged.
The old native pipeline is retired to the device and released by [`Device::drain_retired`].

# Backends

Two backends implement [`imp::Backend`]:

* [`imp::SoftBackend`], a headless reference device with in-memory heaps.  It needs no GPU.
* `imp::WgpuBackend` (feature `backend_wgpu`, on by default), which drives [wgpu](https://wgpu.rs).

```
use roots_and_heaps::bindings::{
    DescriptorHeapInit, DescriptorKind, DescriptorLayoutEntry, DescriptorSetInit,
    DescriptorSetLayout, LayoutSlot, PipelineType, RootBindingLayoutInit, Stages, TableStrategy,
};
use roots_and_heaps::Device;
use roots_and_heaps::imp::SoftBackend;

let device = Device::new(
    SoftBackend::new(TableStrategy::PerSlot),
    DescriptorHeapInit::default(),
).unwrap();

let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
init.push(DescriptorLayoutEntry::new(DescriptorKind::PushUniform, Stages::VERTEX, 0, 16));
init.set(
    DescriptorSetLayout::new()
        .with(DescriptorKind::UniformBuffer, Stages::VERTEX, 1, 1)
        .with(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 0, 1),
);
let layout = device.create_root_descriptor_layout(init).unwrap();
assert_eq!(layout.root_parameter_count(), 2);

let set = device
    .create_descriptor_set(DescriptorSetInit::Slot { layout, slot: LayoutSlot::Set(0) })
    .unwrap();
assert_eq!(set.resource_base(), 0);
assert_eq!(set.resource_count(), 2);
```
*/

logwise::declare_logging_domain!();

pub mod bindings;
pub mod shaders;
pub mod pipeline;
pub mod watcher;
pub mod batch;
pub mod device;
pub mod imp;

pub use batch::{BindError, Batch, RecordedBatch};
pub use device::Device;
pub use pipeline::{Pipeline, PipelineInit, RealizeError};
pub use shaders::{Program, Shader};
pub use watcher::{Watcher, WatcherConfig};
