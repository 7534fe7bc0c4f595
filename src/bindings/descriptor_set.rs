// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Descriptor sets: contiguous heap ranges holding concrete views.

A set is allocated against one slot of a [`RootBindingLayout`].  Allocation reserves
`resource_count` descriptors and `sampler_count` samplers from the device heap and precomputes
where each element's view lives.  An update then writes every view in place and keeps the written
objects alive.

Layout-less ("raw") sets reserve heap space for an explicit entry list.  They expose their
handles, for instance to build shader records, but have no root parameters and so bind nothing.
*/

use crate::bindings::heap::{AllocError, CpuHandle, DescriptorHeap, GpuHandle, Pool};
use crate::bindings::layout::{DescriptorKind, DescriptorLayoutEntry, LayoutSlot, PipelineType};
use crate::bindings::resources::{BoundObject, ViewDesc};
use crate::bindings::root_layout::{LayoutError, RootBindingLayout};
use crate::imp::{self, Backend};
use std::sync::Arc;

pub enum DescriptorSetInit<B: Backend> {
    /// Allocate against a slot of a root layout.
    Slot {
        layout: Arc<RootBindingLayout<B>>,
        slot: LayoutSlot,
    },
    /// Allocate for a standalone entry list.
    Raw { entries: Vec<DescriptorLayoutEntry> },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CreateError {
    #[error("Can't create descriptor set {0}")]
    Layout(#[from] LayoutError),
    #[error("Can't create descriptor set {0}")]
    Alloc(#[from] AllocError),
    #[error("Entries hold more descriptors in one pool than fit in a u32")]
    CountOverflow,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UpdateError {
    #[error("Descriptor set holds {expected} objects but {got} were supplied")]
    LayoutMismatch { expected: usize, got: usize },
    #[error("Object {position} is a {got:?} but the layout expects a {expected:?}")]
    KindMismatch {
        position: usize,
        expected: DescriptorKind,
        got: DescriptorKind,
    },
    #[error("Object {position} can't be written as a {kind:?}: {reason}")]
    UsageMismatch {
        position: usize,
        kind: DescriptorKind,
        reason: &'static str,
    },
    #[error("Can't write view {0}")]
    Native(#[from] imp::Error),
}

/// A root parameter of this set and the table address bound to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableHandle {
    /// `None` when the entry has no root parameter; such tables are never bound.
    pub root_index: Option<u32>,
    pub gpu: GpuHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ViewSlot {
    kind: DescriptorKind,
    pool: Pool,
    cpu: CpuHandle,
}

struct Shared<B: Backend> {
    layout: Option<Arc<RootBindingLayout<B>>>,
    slot: Option<LayoutSlot>,
    entries: Vec<DescriptorLayoutEntry>,
    resource_count: u32,
    sampler_count: u32,
    resource_base: u32,
    sampler_base: u32,
    /// First GPU handle of each entry, in declaration order.
    entry_handles: Vec<GpuHandle>,
    tables: Vec<TableHandle>,
    views: Vec<ViewSlot>,
    bound: wasm_safe_mutex::Mutex<Vec<BoundObject<B>>>,
}

/// A group of views occupying a contiguous range of the heap.
pub struct DescriptorSet<B: Backend> {
    shared: Arc<Shared<B>>,
}

impl<B: Backend> Clone for DescriptorSet<B> {
    fn clone(&self) -> Self {
        DescriptorSet {
            shared: self.shared.clone(),
        }
    }
}

impl<B: Backend> DescriptorSet<B> {
    pub(crate) fn allocate(
        heap: &DescriptorHeap<B>,
        init: DescriptorSetInit<B>,
    ) -> Result<Self, CreateError> {
        let (layout, slot, entries, tables) = match init {
            DescriptorSetInit::Slot { layout, slot } => {
                let info = layout
                    .slot(slot)
                    .ok_or(LayoutError::SlotOutOfRange(slot))?;
                let entries = info.entries().to_vec();
                let tables = info.tables().to_vec();
                (Some(layout), Some(slot), entries, tables)
            }
            DescriptorSetInit::Raw { entries } => (None, None, entries, Vec::new()),
        };
        let count = |pred: fn(DescriptorKind) -> bool| {
            entries
                .iter()
                .filter(|e| pred(e.kind()))
                .try_fold(0u32, |total, e| total.checked_add(e.count()))
                .ok_or(CreateError::CountOverflow)
        };
        let resource_count = count(DescriptorKind::is_resource_view)?;
        let sampler_count = count(DescriptorKind::is_sampler)?;
        //the heap is append-only, so a failed sampler allocation leaves the resource range reserved
        let resource_base = heap.allocate(Pool::Resources, resource_count)?;
        let sampler_base = heap.allocate(Pool::Samplers, sampler_count)?;
        let base = |pool: Pool| match pool {
            Pool::Resources => resource_base,
            Pool::Samplers => sampler_base,
        };

        let mut views = Vec::with_capacity(resource_count as usize + sampler_count as usize);
        let mut entry_handles = Vec::with_capacity(entries.len());
        let mut resource_offset = 0;
        let mut sampler_offset = 0;
        for entry in &entries {
            let pool = if entry.kind().is_sampler() {
                Pool::Samplers
            } else {
                Pool::Resources
            };
            let offset = match pool {
                Pool::Resources => &mut resource_offset,
                Pool::Samplers => &mut sampler_offset,
            };
            entry_handles.push(heap.gpu_handle(pool, base(pool) + *offset));
            if entry.kind() == DescriptorKind::PushUniform {
                continue;
            }
            for _ in 0..entry.count() {
                views.push(ViewSlot {
                    kind: entry.kind(),
                    pool,
                    cpu: heap.cpu_handle(pool, base(pool) + *offset),
                });
                *offset += 1;
            }
        }
        let tables = tables
            .iter()
            .map(|t| TableHandle {
                root_index: t.root_index,
                gpu: heap.gpu_handle(t.pool, base(t.pool) + t.offset),
            })
            .collect();
        logwise::trace_sync!(
            "Allocated descriptor set: {resources} resources at {resource_base}, {samplers} samplers at {sampler_base}",
            resources = resource_count,
            resource_base = resource_base,
            samplers = sampler_count,
            sampler_base = sampler_base
        );
        Ok(DescriptorSet {
            shared: Arc::new(Shared {
                layout,
                slot,
                entries,
                resource_count,
                sampler_count,
                resource_base,
                sampler_base,
                entry_handles,
                tables,
                views,
                bound: wasm_safe_mutex::Mutex::new(Vec::new()),
            }),
        })
    }

    /**
    Writes one view per object and retains the objects.

    `objects` must hold exactly `resource_count + sampler_count` entries, in element order, and
    each object must match the kind of the element it lands in, with a usage that allows that
    view.  Every check runs before anything is written, so a rejected update leaves the heap and
    the retained objects untouched.
    */
    pub(crate) fn write(
        &self,
        backend: &B,
        heap: &DescriptorHeap<B>,
        objects: Vec<BoundObject<B>>,
    ) -> Result<(), UpdateError> {
        let shared = &self.shared;
        if objects.len() != shared.views.len() {
            logwise::error_sync!(
                "Descriptor set update rejected: expected {expected} objects, got {got}",
                expected = shared.views.len(),
                got = objects.len()
            );
            return Err(UpdateError::LayoutMismatch {
                expected: shared.views.len(),
                got: objects.len(),
            });
        }
        for (position, (view, object)) in shared.views.iter().zip(&objects).enumerate() {
            if view.kind != object.kind() {
                logwise::error_sync!(
                    "Descriptor set update rejected: object {position} is {got}, expected {expected}",
                    position = position,
                    got = logwise::privacy::LogIt(&object.kind()),
                    expected = logwise::privacy::LogIt(&view.kind)
                );
                return Err(UpdateError::KindMismatch {
                    position,
                    expected: view.kind,
                    got: object.kind(),
                });
            }
            if let Some(reason) = object.usage_conflict() {
                logwise::error_sync!(
                    "Descriptor set update rejected: object {position} {reason}",
                    position = position,
                    reason = reason.to_string()
                );
                return Err(UpdateError::UsageMismatch {
                    position,
                    kind: view.kind,
                    reason,
                });
            }
            backend.check_view(view.kind, &ViewDesc::of(object))?;
        }
        for (view, object) in shared.views.iter().zip(&objects) {
            backend.write_view(heap.native(), view.pool, view.cpu, ViewDesc::of(object))?;
        }
        *shared.bound.lock_sync() = objects;
        Ok(())
    }

    /// The layout this set was allocated against.  `None` for raw sets.
    pub fn layout(&self) -> Option<&Arc<RootBindingLayout<B>>> {
        self.shared.layout.as_ref()
    }

    pub fn slot(&self) -> Option<LayoutSlot> {
        self.shared.slot
    }

    pub fn pipeline_type(&self) -> Option<PipelineType> {
        self.shared.layout.as_ref().map(|l| l.pipeline_type())
    }

    pub fn entries(&self) -> &[DescriptorLayoutEntry] {
        &self.shared.entries
    }

    pub fn resource_count(&self) -> u32 {
        self.shared.resource_count
    }

    pub fn sampler_count(&self) -> u32 {
        self.shared.sampler_count
    }

    /// Index of the first reserved descriptor in the resource pool.
    pub fn resource_base(&self) -> u32 {
        self.shared.resource_base
    }

    /// Index of the first reserved sampler in the sampler pool.
    pub fn sampler_base(&self) -> u32 {
        self.shared.sampler_base
    }

    /// GPU handle of each entry's first element.
    pub fn entry_handles(&self) -> &[GpuHandle] {
        &self.shared.entry_handles
    }

    /// Tables to bind, in root parameter order.
    pub fn tables(&self) -> &[TableHandle] {
        &self.shared.tables
    }

    /// Objects from the last successful update.
    pub fn bound_objects(&self) -> Vec<BoundObject<B>> {
        self.shared.bound.lock_sync().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<B: Backend> std::fmt::Debug for DescriptorSet<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("slot", &self.shared.slot)
            .field("resource_base", &self.shared.resource_base)
            .field("resource_count", &self.shared.resource_count)
            .field("sampler_base", &self.shared.sampler_base)
            .field("sampler_count", &self.shared.sampler_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::heap::DescriptorHeapInit;
    use crate::bindings::layout::{DescriptorSetLayout, RootBindingLayoutInit};
    use crate::bindings::stages::Stages;
    use crate::bindings::translate::TableStrategy;
    use crate::imp::soft::SoftBackend;

    fn layout(backend: &SoftBackend) -> Arc<RootBindingLayout<SoftBackend>> {
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.set(
            DescriptorSetLayout::new()
                .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, 2)
                .with(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 1)
                .with(DescriptorKind::UniformBuffer, Stages::VERTEX, 0, 1),
        );
        Arc::new(RootBindingLayout::new(backend, init).unwrap())
    }

    #[test]
    fn element_handles_walk_each_pool() {
        let backend = SoftBackend::new(TableStrategy::PerEntry);
        let heap = DescriptorHeap::new(&backend, DescriptorHeapInit::default()).unwrap();
        let layout = layout(&backend);
        let set = DescriptorSet::allocate(
            &heap,
            DescriptorSetInit::Slot {
                layout,
                slot: LayoutSlot::Set(0),
            },
        )
        .unwrap();
        assert_eq!(set.resource_count(), 3);
        assert_eq!(set.sampler_count(), 1);
        let handles = set.entry_handles();
        assert_eq!(handles[0], heap.gpu_handle(Pool::Resources, 0));
        assert_eq!(handles[1], heap.gpu_handle(Pool::Samplers, 0));
        assert_eq!(handles[2], heap.gpu_handle(Pool::Resources, 2));
        let roots: Vec<_> = set.tables().iter().map(|t| t.root_index).collect();
        assert_eq!(roots, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(set.tables()[2].gpu, heap.gpu_handle(Pool::Resources, 2));
    }

    #[test]
    fn missing_slot_is_an_error() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let heap = DescriptorHeap::new(&backend, DescriptorHeapInit::default()).unwrap();
        let result = DescriptorSet::allocate(
            &heap,
            DescriptorSetInit::Slot {
                layout: layout(&backend),
                slot: LayoutSlot::Set(3),
            },
        );
        assert!(matches!(
            result,
            Err(CreateError::Layout(LayoutError::SlotOutOfRange(LayoutSlot::Set(3))))
        ));
        assert_eq!(heap.usage().descriptors_allocated, 0);
    }

    #[test]
    fn raw_sets_have_no_tables() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let heap = DescriptorHeap::new(&backend, DescriptorHeapInit::default()).unwrap();
        let set = DescriptorSet::allocate(
            &heap,
            DescriptorSetInit::Raw {
                entries: vec![DescriptorLayoutEntry::new(
                    DescriptorKind::RWResourceBuffer,
                    Stages::RAYTRACING,
                    0,
                    4,
                )],
            },
        )
        .unwrap();
        assert!(set.tables().is_empty());
        assert!(set.layout().is_none());
        assert_eq!(set.resource_count(), 4);
        assert_eq!(heap.usage().descriptors_allocated, 4);
    }

    #[test]
    fn oversized_raw_sets_reserve_nothing() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let heap = DescriptorHeap::new(&backend, DescriptorHeapInit::default()).unwrap();
        let result = DescriptorSet::allocate(
            &heap,
            DescriptorSetInit::Raw {
                entries: vec![
                    DescriptorLayoutEntry::new(
                        DescriptorKind::ResourceTexture,
                        Stages::FRAGMENT,
                        0,
                        u32::MAX,
                    ),
                    DescriptorLayoutEntry::new(
                        DescriptorKind::UniformBuffer,
                        Stages::FRAGMENT,
                        0,
                        1,
                    ),
                ],
            },
        );
        assert!(matches!(result, Err(CreateError::CountOverflow)));
        assert_eq!(heap.usage().descriptors_allocated, 0);
    }
}
