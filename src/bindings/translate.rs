// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Translation of abstract layouts into native root parameters.

Backends disagree about how resource views can be grouped into tables.  Some can place
any mix of constant-buffer, shader-resource and unordered-access ranges in one table; others
need one table per binding.  A [`TableStrategy`] picks the translator used for descriptor set
slots.  Push entries and the sampler slot are translated the same way by every strategy.

The output of translation is a [`RootLayoutDesc`]: an ordered list of [`RootParameter`]s that a
backend serializes into its native root layout.
*/

use crate::bindings::heap::Pool;
use crate::bindings::layout::{DescriptorKind, DescriptorLayoutEntry, PipelineType};
use crate::bindings::stages::{Stages, Visibility};

/// How descriptor set slots are grouped into tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableStrategy {
    /// One table per layout entry.
    PerEntry,
    /// One table for all resource views of a slot, plus one for its samplers.
    PerSlot,
}

impl TableStrategy {
    pub(crate) fn translator(self) -> &'static dyn TableTranslator {
        match self {
            TableStrategy::PerEntry => &PerEntryTables,
            TableStrategy::PerSlot => &PerSlotTables,
        }
    }
}

/// Native view class of a descriptor range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RangeClass {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    Sampler,
}

impl RangeClass {
    /// `None` for push entries, which never occupy a range.
    pub fn of(kind: DescriptorKind) -> Option<RangeClass> {
        match kind {
            DescriptorKind::Sampler => Some(RangeClass::Sampler),
            DescriptorKind::UniformBuffer => Some(RangeClass::ConstantBuffer),
            DescriptorKind::ResourceBuffer | DescriptorKind::ResourceTexture => {
                Some(RangeClass::ShaderResource)
            }
            DescriptorKind::RWResourceBuffer | DescriptorKind::RWResourceTexture => {
                Some(RangeClass::UnorderedAccess)
            }
            DescriptorKind::PushUniform => None,
        }
    }
}

/// A run of consecutive descriptors inside a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    pub kind: DescriptorKind,
    pub base_register: u32,
    pub count: u32,
    /// Offset in descriptors from the start of the table.
    pub offset: u32,
}

impl DescriptorRange {
    pub fn class(&self) -> RangeClass {
        //ranges are never built from push entries
        RangeClass::of(self.kind).unwrap_or(RangeClass::ConstantBuffer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RootParameter {
    /// Inline 32-bit constants.
    Constants {
        register: u32,
        num_values: u32,
        visibility: Visibility,
    },
    /// A table of descriptors living in one pool of the heap.
    Table {
        pool: Pool,
        ranges: Vec<DescriptorRange>,
        visibility: Visibility,
    },
}

impl RootParameter {
    pub fn visibility(&self) -> Visibility {
        match self {
            RootParameter::Constants { visibility, .. } => *visibility,
            RootParameter::Table { visibility, .. } => *visibility,
        }
    }

    /// Number of descriptors a table spans.  Zero for constants.
    pub fn descriptor_count(&self) -> u32 {
        match self {
            RootParameter::Constants { .. } => 0,
            RootParameter::Table { ranges, .. } => ranges.iter().map(|r| r.count).sum(),
        }
    }
}

/// A native root layout, before the backend serializes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootLayoutDesc {
    pub label: String,
    pub pipeline_type: PipelineType,
    pub local: bool,
    pub parameters: Vec<RootParameter>,
}

/// Where a table of a slot is bound, and where it starts within the slot's heap range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotTable {
    /// `None` when the entry produced no root parameter.
    pub root_index: Option<u32>,
    pub pool: Pool,
    /// Offset in descriptors from the slot's first descriptor in `pool`.
    pub offset: u32,
}

pub(crate) trait TableTranslator: Sync {
    /// Appends the tables for one descriptor set slot to `parameters`.
    ///
    /// Returns `None` if the slot holds more descriptors in one pool than a `u32` can count.
    fn translate_slot(
        &self,
        entries: &[DescriptorLayoutEntry],
        parameters: &mut Vec<RootParameter>,
    ) -> Option<Vec<SlotTable>>;
}

fn pool_of(kind: DescriptorKind) -> Pool {
    if kind.is_sampler() {
        Pool::Samplers
    } else {
        Pool::Resources
    }
}

fn root_index(parameters: &[RootParameter]) -> u32 {
    parameters.len() as u32
}

struct PerEntryTables;

impl TableTranslator for PerEntryTables {
    fn translate_slot(
        &self,
        entries: &[DescriptorLayoutEntry],
        parameters: &mut Vec<RootParameter>,
    ) -> Option<Vec<SlotTable>> {
        let mut resource_offset = 0u32;
        let mut sampler_offset = 0u32;
        entries
            .iter()
            .map(|entry| {
                let pool = pool_of(entry.kind());
                let cursor = match pool {
                    Pool::Resources => &mut resource_offset,
                    Pool::Samplers => &mut sampler_offset,
                };
                let offset = *cursor;
                if entry.kind() == DescriptorKind::PushUniform || entry.count() == 0 {
                    return Some(SlotTable {
                        root_index: None,
                        pool,
                        offset,
                    });
                }
                *cursor = cursor.checked_add(entry.count())?;
                let index = root_index(parameters);
                parameters.push(RootParameter::Table {
                    pool,
                    ranges: vec![DescriptorRange {
                        kind: entry.kind(),
                        base_register: entry.binding(),
                        count: entry.count(),
                        offset: 0,
                    }],
                    visibility: Visibility::resolve(entry.stages()),
                });
                Some(SlotTable {
                    root_index: Some(index),
                    pool,
                    offset,
                })
            })
            .collect()
    }
}

struct PerSlotTables;

impl TableTranslator for PerSlotTables {
    fn translate_slot(
        &self,
        entries: &[DescriptorLayoutEntry],
        parameters: &mut Vec<RootParameter>,
    ) -> Option<Vec<SlotTable>> {
        let mut tables = Vec::new();
        for pool in [Pool::Resources, Pool::Samplers] {
            let (ranges, stages) = append_ranges(
                entries
                    .iter()
                    .filter(|e| e.kind() != DescriptorKind::PushUniform)
                    .filter(|e| pool_of(e.kind()) == pool),
            )?;
            if ranges.is_empty() {
                continue;
            }
            tables.push(SlotTable {
                root_index: Some(root_index(parameters)),
                pool,
                offset: 0,
            });
            parameters.push(RootParameter::Table {
                pool,
                ranges,
                visibility: Visibility::resolve(stages),
            });
        }
        Some(tables)
    }
}

/// Lays ranges out back to back, skipping entries with nothing in them.
///
/// `None` if the ranges together span more than `u32::MAX` descriptors.
pub(crate) fn append_ranges<'a>(
    entries: impl Iterator<Item = &'a DescriptorLayoutEntry>,
) -> Option<(Vec<DescriptorRange>, Stages)> {
    let mut offset = 0u32;
    let mut stages = Stages::NONE;
    let mut ranges = Vec::new();
    for entry in entries.filter(|e| e.count() > 0) {
        ranges.push(DescriptorRange {
            kind: entry.kind(),
            base_register: entry.binding(),
            count: entry.count(),
            offset,
        });
        offset = offset.checked_add(entry.count())?;
        stages |= entry.stages();
    }
    Some((ranges, stages))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: DescriptorKind, stages: Stages, binding: u32, count: u32) -> DescriptorLayoutEntry {
        DescriptorLayoutEntry::new(kind, stages, binding, count)
    }

    #[test]
    fn per_entry_skips_empty_entries() {
        let entries = [
            entry(DescriptorKind::UniformBuffer, Stages::VERTEX, 0, 1),
            entry(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, 0),
            entry(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 1, 3),
            entry(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 1),
        ];
        let mut params = vec![RootParameter::Constants {
            register: 0,
            num_values: 1,
            visibility: Visibility::All,
        }];
        let tables = PerEntryTables.translate_slot(&entries, &mut params).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(
            tables,
            vec![
                SlotTable { root_index: Some(1), pool: Pool::Resources, offset: 0 },
                SlotTable { root_index: None, pool: Pool::Resources, offset: 1 },
                SlotTable { root_index: Some(2), pool: Pool::Resources, offset: 1 },
                SlotTable { root_index: Some(3), pool: Pool::Samplers, offset: 0 },
            ]
        );
        assert_eq!(params[2].visibility(), Visibility::Fragment);
    }

    #[test]
    fn per_slot_appends_ranges() {
        let entries = [
            entry(DescriptorKind::UniformBuffer, Stages::VERTEX, 0, 1),
            entry(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 2),
            entry(DescriptorKind::RWResourceBuffer, Stages::FRAGMENT, 0, 2),
            entry(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 4, 3),
        ];
        let mut params = Vec::new();
        let tables = PerSlotTables.translate_slot(&entries, &mut params).unwrap();
        assert_eq!(tables.len(), 2);
        let RootParameter::Table { ranges, visibility, pool } = &params[0] else {
            panic!("expected a table");
        };
        assert_eq!(*pool, Pool::Resources);
        assert_eq!(*visibility, Visibility::All);
        let offsets: Vec<u32> = ranges.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3]);
        assert_eq!(params[0].descriptor_count(), 6);
        assert_eq!(params[1].descriptor_count(), 2);
        assert_eq!(params[1].visibility(), Visibility::Fragment);
    }

    #[test]
    fn per_slot_empty_slot_emits_nothing() {
        let mut params = Vec::new();
        let tables = PerSlotTables.translate_slot(&[], &mut params).unwrap();
        assert!(tables.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn oversized_slots_do_not_wrap() {
        let entries = [
            entry(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, u32::MAX),
            entry(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 1, 1),
        ];
        for translator in [&PerEntryTables as &dyn TableTranslator, &PerSlotTables] {
            let mut params = Vec::new();
            assert!(translator.translate_slot(&entries, &mut params).is_none());
        }
        //one pool may be full while the other is not
        let split = [
            entry(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, u32::MAX),
            entry(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 1),
        ];
        let mut params = Vec::new();
        assert_eq!(PerSlotTables.translate_slot(&split, &mut params).unwrap().len(), 2);
    }
}
