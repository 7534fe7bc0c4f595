// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend-agnostic descriptions of shader resource bindings.
//!
//! These types describe *what* a shader expects to be bound, without saying how a
//! particular backend lays that out.  A [`RootBindingLayoutInit`] is made of three parts:
//!
//! - **Push entries**: small inline constants, bound without going through the heap
//! - **Descriptor set layouts**: ordered groups of resource views that live in the
//!   descriptor heap
//! - **A sampler layout**: samplers, which live in their own heap
//!
//! The order of everything in here is significant.  The root layout builder assigns
//! native parameter indices by walking these lists in declaration order, and descriptor
//! sets later recover those indices purely by position.
//!
//! # Example
//!
//! ```
//! use roots_and_heaps::bindings::layout::{
//!     DescriptorKind, DescriptorLayoutEntry, DescriptorSetLayout, PipelineType,
//!     RootBindingLayoutInit,
//! };
//! use roots_and_heaps::bindings::stages::Stages;
//!
//! let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
//! //16 bytes of per-draw data, register 0
//! init.push(DescriptorLayoutEntry::new(DescriptorKind::PushUniform, Stages::VERTEX, 0, 16));
//! init.set(
//!     DescriptorSetLayout::new()
//!         .with(DescriptorKind::UniformBuffer, Stages::VERTEX, 1, 1)
//!         .with(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 0, 1),
//! );
//! assert_eq!(init.set_layouts().len(), 1);
//! ```

use crate::bindings::stages::Stages;

/// The kind of resource a layout entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Sampler,
    /// A constant buffer.
    UniformBuffer,
    /// A read-only structured or raw buffer.
    ResourceBuffer,
    /// A read-write buffer.
    RWResourceBuffer,
    /// A read-only texture.
    ResourceTexture,
    /// A read-write texture.
    RWResourceTexture,
    /// Inline constants.  For this kind, the entry's count is a size in bytes.
    PushUniform,
}

impl DescriptorKind {
    /// Whether this kind occupies the sampler heap.
    pub const fn is_sampler(self) -> bool {
        matches!(self, DescriptorKind::Sampler)
    }

    /// Whether this kind occupies the resource-view heap.
    pub const fn is_resource_view(self) -> bool {
        !matches!(self, DescriptorKind::Sampler | DescriptorKind::PushUniform)
    }
}

/// One binding within a layout.
///
/// Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorLayoutEntry {
    kind: DescriptorKind,
    stages: Stages,
    binding: u32,
    count: u32,
}

impl DescriptorLayoutEntry {
    /// Creates a new entry.
    ///
    /// # Parameters
    ///
    /// * `kind` - what is bound here
    /// * `stages` - which shader stages read it
    /// * `binding` - the shader register / binding number
    /// * `count` - number of elements; for [`DescriptorKind::PushUniform`], a byte size
    pub const fn new(kind: DescriptorKind, stages: Stages, binding: u32, count: u32) -> Self {
        Self {
            kind,
            stages,
            binding,
            count,
        }
    }

    pub const fn kind(&self) -> DescriptorKind {
        self.kind
    }
    pub const fn stages(&self) -> Stages {
        self.stages
    }
    pub const fn binding(&self) -> u32 {
        self.binding
    }
    pub const fn count(&self) -> u32 {
        self.count
    }
}

/// An ordered list of entries bound together as one descriptor set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayout {
    entries: Vec<DescriptorLayoutEntry>,
}

impl DescriptorSetLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<DescriptorLayoutEntry>) -> Self {
        Self { entries }
    }

    /// Appends an entry, builder-style.
    pub fn with(mut self, kind: DescriptorKind, stages: Stages, binding: u32, count: u32) -> Self {
        self.entries
            .push(DescriptorLayoutEntry::new(kind, stages, binding, count));
        self
    }

    pub fn entries(&self) -> &[DescriptorLayoutEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of element counts over resource-view entries, saturating at `u32::MAX`.
    pub fn resource_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.kind.is_resource_view())
            .fold(0u32, |total, e| total.saturating_add(e.count))
    }

    /// Sum of element counts over sampler entries, saturating at `u32::MAX`.
    pub fn sampler_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.kind.is_sampler())
            .fold(0u32, |total, e| total.saturating_add(e.count))
    }

    /// Union of the stages every entry is visible to.
    pub fn stages(&self) -> Stages {
        self.entries
            .iter()
            .fold(Stages::NONE, |acc, e| acc | e.stages)
    }
}

/// Which kind of pipeline a layout (or a bind call) targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
    Raytracing,
}

/// A slot within a root binding layout.
///
/// Descriptor sets are allocated against exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutSlot {
    /// The descriptor set layout at this index, in declaration order.
    Set(usize),
    /// The sampler layout.
    Samplers,
}

/// Abstract description of a root binding layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootBindingLayoutInit {
    pub(crate) push_entries: Vec<DescriptorLayoutEntry>,
    pub(crate) set_layouts: Vec<DescriptorSetLayout>,
    pub(crate) sampler_layout: DescriptorSetLayout,
    pub(crate) pipeline_type: PipelineType,
    /// Raytracing local (per shader record) layout rather than a global one.
    pub(crate) local: bool,
    pub(crate) label: String,
}

impl RootBindingLayoutInit {
    pub fn new(pipeline_type: PipelineType) -> Self {
        RootBindingLayoutInit {
            push_entries: Vec::new(),
            set_layouts: Vec::new(),
            sampler_layout: DescriptorSetLayout::new(),
            pipeline_type,
            local: false,
            label: String::from("root layout"),
        }
    }

    /// Appends a push entry.  Its kind should be [`DescriptorKind::PushUniform`].
    pub fn push(&mut self, entry: DescriptorLayoutEntry) -> &mut Self {
        self.push_entries.push(entry);
        self
    }

    /// Appends a descriptor set layout; the returned index is its [`LayoutSlot::Set`] index.
    pub fn set(&mut self, layout: DescriptorSetLayout) -> usize {
        self.set_layouts.push(layout);
        self.set_layouts.len() - 1
    }

    /// Appends an entry to the sampler layout.
    pub fn sampler(&mut self, stages: Stages, binding: u32, count: u32) -> &mut Self {
        self.sampler_layout.entries.push(DescriptorLayoutEntry::new(
            DescriptorKind::Sampler,
            stages,
            binding,
            count,
        ));
        self
    }

    pub fn local(&mut self, local: bool) -> &mut Self {
        self.local = local;
        self
    }

    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    pub fn push_entries(&self) -> &[DescriptorLayoutEntry] {
        &self.push_entries
    }
    pub fn set_layouts(&self) -> &[DescriptorSetLayout] {
        &self.set_layouts
    }
    pub fn sampler_layout(&self) -> &DescriptorSetLayout {
        &self.sampler_layout
    }
    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// The entries of a slot, in declaration order.
    pub fn slot_entries(&self, slot: LayoutSlot) -> Option<&[DescriptorLayoutEntry]> {
        match slot {
            LayoutSlot::Set(index) => self.set_layouts.get(index).map(|s| s.entries()),
            LayoutSlot::Samplers => Some(self.sampler_layout.entries()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_split_by_heap() {
        let layout = DescriptorSetLayout::new()
            .with(DescriptorKind::UniformBuffer, Stages::VERTEX, 0, 1)
            .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 1, 4)
            .with(DescriptorKind::Sampler, Stages::FRAGMENT, 0, 2)
            .with(DescriptorKind::PushUniform, Stages::FRAGMENT, 2, 64);
        assert_eq!(layout.resource_count(), 5);
        assert_eq!(layout.sampler_count(), 2);
        assert_eq!(layout.stages(), Stages::VERTEX | Stages::FRAGMENT);
    }

    #[test]
    fn counts_saturate() {
        let layout = DescriptorSetLayout::new()
            .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, u32::MAX)
            .with(DescriptorKind::ResourceBuffer, Stages::FRAGMENT, 1, 2);
        assert_eq!(layout.resource_count(), u32::MAX);
    }

    #[test]
    fn set_returns_slot_index() {
        let mut init = RootBindingLayoutInit::new(PipelineType::Compute);
        assert_eq!(init.set(DescriptorSetLayout::new()), 0);
        assert_eq!(init.set(DescriptorSetLayout::new()), 1);
        assert!(init.slot_entries(LayoutSlot::Set(2)).is_none());
        assert_eq!(init.slot_entries(LayoutSlot::Samplers).map(|e| e.len()), Some(0));
    }
}
