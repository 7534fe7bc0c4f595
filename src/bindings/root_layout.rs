// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The root binding layout builder.

[`RootBindingLayout::new`] walks a [`RootBindingLayoutInit`] and emits native root parameters in
a fixed order:

1. one inline-constants parameter per push entry,
2. the tables of each descriptor set slot, in declaration order,
3. one table for the sampler layout, if it has any entries.

Descriptor sets and batches recover root parameter indices by position, so the order above is
part of the layout's contract.  Which tables a descriptor set slot produces depends on the
backend's [`TableStrategy`](crate::bindings::translate::TableStrategy).
*/

use crate::bindings::heap::Pool;
use crate::bindings::layout::{
    DescriptorKind, DescriptorLayoutEntry, LayoutSlot, PipelineType, RootBindingLayoutInit,
};
use crate::bindings::stages::Visibility;
use crate::bindings::translate::{RootLayoutDesc, RootParameter, SlotTable, append_ranges};
use crate::imp::{self, Backend};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LayoutError {
    #[error("Push entry {index} is a {kind:?}, not a push uniform")]
    NotPushUniform { index: usize, kind: DescriptorKind },
    #[error("Push entry {index} is {size} bytes, which is not a multiple of 4")]
    UnalignedPushConstant { index: usize, size: u32 },
    #[error("The sampler layout contains a {0:?}")]
    NonSamplerInSamplerLayout(DescriptorKind),
    #[error("Local layouts are only meaningful for raytracing, not {0:?}")]
    LocalOutsideRaytracing(PipelineType),
    #[error("Slot {0:?} holds more descriptors in one pool than fit in a u32")]
    CountOverflow(LayoutSlot),
    #[error("Slot {0:?} is not part of this layout")]
    SlotOutOfRange(LayoutSlot),
    #[error("Can't build native root layout {0}")]
    Native(#[from] imp::Error),
}

/// What a layout recorded about one of its slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotInfo {
    entries: Vec<DescriptorLayoutEntry>,
    tables: Vec<SlotTable>,
    resource_count: u32,
    sampler_count: u32,
}

impl SlotInfo {
    fn new(
        slot: LayoutSlot,
        entries: &[DescriptorLayoutEntry],
        tables: Vec<SlotTable>,
    ) -> Result<Self, LayoutError> {
        let count = |pred: fn(DescriptorKind) -> bool| {
            entries
                .iter()
                .filter(|e| pred(e.kind()))
                .try_fold(0u32, |total, e| total.checked_add(e.count()))
                .ok_or(LayoutError::CountOverflow(slot))
        };
        Ok(SlotInfo {
            entries: entries.to_vec(),
            tables,
            resource_count: count(DescriptorKind::is_resource_view)?,
            sampler_count: count(DescriptorKind::is_sampler)?,
        })
    }

    pub fn entries(&self) -> &[DescriptorLayoutEntry] {
        &self.entries
    }

    /// Tables of this slot, in root parameter order.
    pub fn tables(&self) -> &[SlotTable] {
        &self.tables
    }

    /// The first root parameter this slot is bound through.
    pub fn root_index(&self) -> Option<u32> {
        self.tables.iter().find_map(|t| t.root_index)
    }

    pub fn resource_count(&self) -> u32 {
        self.resource_count
    }

    pub fn sampler_count(&self) -> u32 {
        self.sampler_count
    }
}

/**
A native root layout together with the slot metadata needed to bind against it.

Built once through [`Device::create_root_descriptor_layout`](crate::device::Device::create_root_descriptor_layout)
and shared by `Arc` between descriptor sets, pipelines and batches.
*/
pub struct RootBindingLayout<B: Backend> {
    native: Arc<B::RootLayout>,
    desc: RootLayoutDesc,
    init: RootBindingLayoutInit,
    push_root_indices: Vec<u32>,
    slots: Vec<SlotInfo>,
    samplers: SlotInfo,
}

impl<B: Backend> RootBindingLayout<B> {
    pub(crate) fn new(backend: &B, init: RootBindingLayoutInit) -> Result<Self, LayoutError> {
        if init.local && init.pipeline_type != PipelineType::Raytracing {
            return Err(LayoutError::LocalOutsideRaytracing(init.pipeline_type));
        }
        let mut parameters = Vec::new();

        let mut push_root_indices = Vec::with_capacity(init.push_entries.len());
        for (index, entry) in init.push_entries.iter().enumerate() {
            if entry.kind() != DescriptorKind::PushUniform {
                return Err(LayoutError::NotPushUniform {
                    index,
                    kind: entry.kind(),
                });
            }
            if entry.count() % 4 != 0 {
                return Err(LayoutError::UnalignedPushConstant {
                    index,
                    size: entry.count(),
                });
            }
            push_root_indices.push(parameters.len() as u32);
            parameters.push(RootParameter::Constants {
                register: entry.binding(),
                num_values: entry.count() / 4,
                visibility: Visibility::resolve(entry.stages()),
            });
        }

        let translator = backend.table_strategy().translator();
        let slots = init
            .set_layouts
            .iter()
            .enumerate()
            .map(|(index, layout)| {
                let slot = LayoutSlot::Set(index);
                let tables = translator
                    .translate_slot(layout.entries(), &mut parameters)
                    .ok_or(LayoutError::CountOverflow(slot))?;
                SlotInfo::new(slot, layout.entries(), tables)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sampler_entries = init.sampler_layout.entries();
        if let Some(bad) = sampler_entries.iter().find(|e| !e.kind().is_sampler()) {
            return Err(LayoutError::NonSamplerInSamplerLayout(bad.kind()));
        }
        let (ranges, stages) = append_ranges(sampler_entries.iter())
            .ok_or(LayoutError::CountOverflow(LayoutSlot::Samplers))?;
        let mut sampler_tables = Vec::new();
        if !ranges.is_empty() {
            sampler_tables.push(SlotTable {
                root_index: Some(parameters.len() as u32),
                pool: Pool::Samplers,
                offset: 0,
            });
            parameters.push(RootParameter::Table {
                pool: Pool::Samplers,
                ranges,
                visibility: Visibility::resolve(stages),
            });
        }
        let samplers = SlotInfo::new(LayoutSlot::Samplers, sampler_entries, sampler_tables)?;

        let desc = RootLayoutDesc {
            label: init.label.clone(),
            pipeline_type: init.pipeline_type,
            local: init.local,
            parameters,
        };
        logwise::debuginternal_sync!(
            "Built root layout {label} with {count} parameters",
            label = init.label.clone(),
            count = desc.parameters.len()
        );
        let native = backend.create_root_layout(&desc).map_err(|e| {
            logwise::error_sync!(
                "Native root layout {label} failed: {error}",
                label = init.label.clone(),
                error = e.to_string()
            );
            LayoutError::Native(e)
        })?;
        Ok(RootBindingLayout {
            native: Arc::new(native),
            desc,
            init,
            push_root_indices,
            slots,
            samplers,
        })
    }

    pub fn root_parameter_count(&self) -> usize {
        self.desc.parameters.len()
    }

    pub fn parameters(&self) -> &[RootParameter] {
        &self.desc.parameters
    }

    pub fn desc(&self) -> &RootLayoutDesc {
        &self.desc
    }

    pub fn init(&self) -> &RootBindingLayoutInit {
        &self.init
    }

    /// Root parameter index of the push entry at `index`.
    pub fn push_root_index(&self, index: usize) -> Option<u32> {
        self.push_root_indices.get(index).copied()
    }

    pub fn push_entry(&self, index: usize) -> Option<&DescriptorLayoutEntry> {
        self.init.push_entries.get(index)
    }

    pub fn slot(&self, slot: LayoutSlot) -> Option<&SlotInfo> {
        match slot {
            LayoutSlot::Set(index) => self.slots.get(index),
            LayoutSlot::Samplers => Some(&self.samplers),
        }
    }

    /// Root parameter index of a slot, or `None` when the slot has nothing to bind.
    pub fn slot_root_index(&self, slot: LayoutSlot) -> Option<u32> {
        self.slot(slot).and_then(SlotInfo::root_index)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.init.pipeline_type
    }

    pub fn is_local(&self) -> bool {
        self.init.local
    }

    pub fn label(&self) -> &str {
        &self.init.label
    }

    pub fn native(&self) -> &Arc<B::RootLayout> {
        &self.native
    }
}

impl<B: Backend> std::fmt::Debug for RootBindingLayout<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootBindingLayout")
            .field("label", &self.init.label)
            .field("pipeline_type", &self.init.pipeline_type)
            .field("parameters", &self.desc.parameters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::layout::DescriptorSetLayout;
    use crate::bindings::stages::Stages;
    use crate::bindings::translate::TableStrategy;
    use crate::imp::soft::SoftBackend;

    fn push_and_one_set() -> RootBindingLayoutInit {
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.push(DescriptorLayoutEntry::new(
            DescriptorKind::PushUniform,
            Stages::VERTEX,
            0,
            16,
        ));
        init.set(
            DescriptorSetLayout::new()
                .with(DescriptorKind::UniformBuffer, Stages::VERTEX, 1, 1)
                .with(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 0, 1),
        );
        init
    }

    #[test]
    fn per_slot_produces_two_parameters() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let layout = RootBindingLayout::new(&backend, push_and_one_set()).unwrap();
        assert_eq!(layout.root_parameter_count(), 2);
        assert_eq!(layout.push_root_index(0), Some(0));
        assert_eq!(layout.slot_root_index(LayoutSlot::Set(0)), Some(1));
        assert_eq!(layout.slot_root_index(LayoutSlot::Samplers), None);
        let slot = layout.slot(LayoutSlot::Set(0)).unwrap();
        assert_eq!(slot.resource_count(), 2);
        assert_eq!(slot.sampler_count(), 0);
        assert_eq!(
            layout.parameters()[0],
            RootParameter::Constants {
                register: 0,
                num_values: 4,
                visibility: Visibility::Vertex
            }
        );
    }

    #[test]
    fn per_entry_produces_one_table_per_entry() {
        let backend = SoftBackend::new(TableStrategy::PerEntry);
        let layout = RootBindingLayout::new(&backend, push_and_one_set()).unwrap();
        assert_eq!(layout.root_parameter_count(), 3);
        let slot = layout.slot(LayoutSlot::Set(0)).unwrap();
        let indices: Vec<_> = slot.tables().iter().map(|t| t.root_index).collect();
        assert_eq!(indices, vec![Some(1), Some(2)]);
        assert_eq!(slot.resource_count(), 2);
    }

    #[test]
    fn unaligned_push_constant_is_rejected() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let mut init = RootBindingLayoutInit::new(PipelineType::Compute);
        init.push(DescriptorLayoutEntry::new(
            DescriptorKind::PushUniform,
            Stages::COMPUTE,
            0,
            6,
        ));
        assert!(matches!(
            RootBindingLayout::new(&backend, init),
            Err(LayoutError::UnalignedPushConstant { index: 0, size: 6 })
        ));
    }

    #[test]
    fn sampler_layout_only_takes_samplers() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.sampler_layout = DescriptorSetLayout::new().with(
            DescriptorKind::ResourceTexture,
            Stages::FRAGMENT,
            0,
            1,
        );
        assert!(matches!(
            RootBindingLayout::new(&backend, init),
            Err(LayoutError::NonSamplerInSamplerLayout(
                DescriptorKind::ResourceTexture
            ))
        ));
    }

    #[test]
    fn local_requires_raytracing() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.local(true);
        assert!(matches!(
            RootBindingLayout::new(&backend, init),
            Err(LayoutError::LocalOutsideRaytracing(PipelineType::Graphics))
        ));
    }

    #[test]
    fn oversized_slot_is_rejected_under_both_strategies() {
        for strategy in [TableStrategy::PerSlot, TableStrategy::PerEntry] {
            let backend = SoftBackend::new(strategy);
            let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
            init.set(DescriptorSetLayout::new().with(
                DescriptorKind::ResourceBuffer,
                Stages::FRAGMENT,
                0,
                1,
            ));
            init.set(
                DescriptorSetLayout::new()
                    .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, u32::MAX)
                    .with(DescriptorKind::UniformBuffer, Stages::FRAGMENT, 1, 1),
            );
            assert!(
                matches!(
                    RootBindingLayout::new(&backend, init),
                    Err(LayoutError::CountOverflow(LayoutSlot::Set(1)))
                ),
                "{strategy:?}"
            );
        }
    }

    #[test]
    fn oversized_sampler_layout_is_rejected() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.sampler(Stages::FRAGMENT, 0, u32::MAX);
        init.sampler(Stages::FRAGMENT, 1, 1);
        assert!(matches!(
            RootBindingLayout::new(&backend, init),
            Err(LayoutError::CountOverflow(LayoutSlot::Samplers))
        ));
    }
}
