// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Root parameter ordering across both table strategies.
//!
//! Push entries come first, then every set slot in declaration order, then the sampler table.

use roots_and_heaps::Device;
use roots_and_heaps::bindings::{
    DescriptorHeapInit, DescriptorKind, DescriptorLayoutEntry, DescriptorSetLayout, LayoutSlot,
    LayoutError, PipelineType, Pool, RootBindingLayoutInit, RootParameter, Stages, TableStrategy,
};
use roots_and_heaps::imp::SoftBackend;

fn device(strategy: TableStrategy) -> Device<SoftBackend> {
    Device::new(SoftBackend::new(strategy), DescriptorHeapInit::default()).unwrap()
}

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
fn push_and_one_set_per_slot_has_two_parameters() {
    let device = device(TableStrategy::PerSlot);
    let layout = device.create_root_descriptor_layout(push_and_one_set()).unwrap();
    assert_eq!(layout.root_parameter_count(), 2);
    assert!(matches!(
        layout.parameters()[0],
        RootParameter::Constants { num_values: 4, .. }
    ));
    assert!(matches!(
        &layout.parameters()[1],
        RootParameter::Table { pool: Pool::Resources, ranges, .. } if ranges.len() == 2
    ));
    assert_eq!(layout.push_root_index(0), Some(0));
    assert_eq!(layout.slot_root_index(LayoutSlot::Set(0)), Some(1));
}

#[test]
fn push_and_one_set_per_entry_has_three_parameters() {
    let device = device(TableStrategy::PerEntry);
    let layout = device.create_root_descriptor_layout(push_and_one_set()).unwrap();
    assert_eq!(layout.root_parameter_count(), 3);
    let tables = layout.slot(LayoutSlot::Set(0)).unwrap().tables();
    assert_eq!(tables[0].root_index, Some(1));
    assert_eq!(tables[1].root_index, Some(2));
    assert_eq!(tables[1].offset, 1);
}

#[test]
fn samplers_come_last_regardless_of_declaration_order() {
    for strategy in [TableStrategy::PerSlot, TableStrategy::PerEntry] {
        let device = device(strategy);
        let mut init = RootBindingLayoutInit::new(PipelineType::Compute);
        //samplers declared before anything else
        init.sampler(Stages::COMPUTE, 0, 2);
        init.set(DescriptorSetLayout::new().with(
            DescriptorKind::RWResourceBuffer,
            Stages::COMPUTE,
            0,
            1,
        ));
        init.push(DescriptorLayoutEntry::new(
            DescriptorKind::PushUniform,
            Stages::COMPUTE,
            0,
            8,
        ));
        init.set(DescriptorSetLayout::new().with(
            DescriptorKind::ResourceTexture,
            Stages::COMPUTE,
            1,
            4,
        ));
        let layout = device.create_root_descriptor_layout(init).unwrap();

        let params = layout.parameters();
        assert_eq!(params.len(), 4, "{strategy:?}");
        assert!(matches!(params[0], RootParameter::Constants { num_values: 2, .. }));
        assert_eq!(layout.slot_root_index(LayoutSlot::Set(0)), Some(1));
        assert_eq!(layout.slot_root_index(LayoutSlot::Set(1)), Some(2));
        assert_eq!(layout.slot_root_index(LayoutSlot::Samplers), Some(3));
        assert!(matches!(
            params[3],
            RootParameter::Table { pool: Pool::Samplers, .. }
        ));
    }
}

#[test]
fn multiple_push_entries_keep_their_order() {
    let device = device(TableStrategy::PerSlot);
    let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
    init.push(DescriptorLayoutEntry::new(DescriptorKind::PushUniform, Stages::VERTEX, 0, 4))
        .push(DescriptorLayoutEntry::new(DescriptorKind::PushUniform, Stages::FRAGMENT, 1, 12));
    let layout = device.create_root_descriptor_layout(init).unwrap();
    assert_eq!(layout.push_root_index(0), Some(0));
    assert_eq!(layout.push_root_index(1), Some(1));
    assert!(matches!(
        layout.parameters()[1],
        RootParameter::Constants { register: 1, num_values: 3, .. }
    ));
}

#[test]
fn mixed_slot_splits_by_pool_under_per_slot() {
    let device = device(TableStrategy::PerSlot);
    let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
    init.set(
        DescriptorSetLayout::new()
            .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, 2)
            .with(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 1),
    );
    let layout = device.create_root_descriptor_layout(init).unwrap();
    let slot = layout.slot(LayoutSlot::Set(0)).unwrap();
    assert_eq!(slot.tables().len(), 2);
    assert_eq!(slot.tables()[0].pool, Pool::Resources);
    assert_eq!(slot.tables()[1].pool, Pool::Samplers);
    assert_eq!(slot.resource_count(), 2);
    assert_eq!(slot.sampler_count(), 1);
}

#[test]
fn empty_layout_has_no_parameters() {
    let device = device(TableStrategy::PerEntry);
    let layout = device
        .create_root_descriptor_layout(RootBindingLayoutInit::new(PipelineType::Compute))
        .unwrap();
    assert_eq!(layout.root_parameter_count(), 0);
    assert_eq!(layout.slot_root_index(LayoutSlot::Samplers), None);
}

#[test]
fn unaligned_push_entry_is_refused() {
    let device = device(TableStrategy::PerSlot);
    let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
    init.push(DescriptorLayoutEntry::new(DescriptorKind::PushUniform, Stages::VERTEX, 0, 6));
    assert!(device.create_root_descriptor_layout(init).is_err());
}

#[test]
fn descriptor_counts_that_overflow_are_refused() {
    for strategy in [TableStrategy::PerSlot, TableStrategy::PerEntry] {
        let device = device(strategy);
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.set(
            DescriptorSetLayout::new()
                .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, u32::MAX)
                .with(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 1, 1),
        );
        let err = device.create_root_descriptor_layout(init).unwrap_err();
        assert!(
            matches!(err, LayoutError::CountOverflow(LayoutSlot::Set(0))),
            "{strategy:?}: {err}"
        );
    }
}
