// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The binding protocol.

A [`Batch`] records bind calls against a backend [`CommandRecorder`](crate::imp::CommandRecorder).
Bind a root layout for a pipeline type first; pipelines, descriptor sets and push data for that
type are then resolved against it.

Everything a batch binds is retained until the [`RecordedBatch`] is dropped, so descriptor sets,
layouts and the native pipeline snapshot outlive any GPU work recorded against them.
*/

use crate::bindings::descriptor_set::DescriptorSet;
use crate::bindings::layout::PipelineType;
use crate::bindings::root_layout::RootBindingLayout;
use crate::device::Device;
use crate::imp::{Backend, CommandRecorder};
use crate::pipeline::Pipeline;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BindError {
    #[error("No root layout is bound for {0:?} pipelines")]
    NoRootLayout(PipelineType),
    #[error("Layout {layout} is for {got:?} pipelines, not {expected:?}")]
    WrongPipelineType {
        layout: String,
        expected: PipelineType,
        got: PipelineType,
    },
    #[error("Layout {0} is local and can't be bound as a root layout")]
    LocalLayout(String),
    #[error("Pipeline {0} was built against a different root layout than the bound one")]
    LayoutNotBound(String),
    #[error("Descriptor set has no root layout and can't be bound")]
    RawSet,
    #[error("Descriptor set was allocated against a different root layout than the bound one")]
    ForeignSet,
    #[error("Push slot {0} is not part of the bound layout")]
    PushSlotOutOfRange(usize),
    #[error("Push data is {size} bytes but slot {slot} holds {capacity}")]
    PushTooLarge {
        slot: usize,
        size: usize,
        capacity: usize,
    },
    #[error("Push data is {0} bytes, which is not a multiple of 4")]
    UnalignedPush(usize),
}

/// Things a batch keeps alive.
pub struct Retained<B: Backend> {
    pub layouts: Vec<Arc<RootBindingLayout<B>>>,
    pub pipelines: Vec<Arc<B::Pipeline>>,
    pub sets: Vec<DescriptorSet<B>>,
}

impl<B: Backend> Default for Retained<B> {
    fn default() -> Self {
        Retained {
            layouts: Vec::new(),
            pipelines: Vec::new(),
            sets: Vec::new(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Retained<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retained")
            .field("layouts", &self.layouts.len())
            .field("pipelines", &self.pipelines.len())
            .field("sets", &self.sets.len())
            .finish()
    }
}

fn type_index(ty: PipelineType) -> usize {
    match ty {
        PipelineType::Graphics => 0,
        PipelineType::Compute => 1,
        PipelineType::Raytracing => 2,
    }
}

pub struct Batch<B: Backend> {
    device: Device<B>,
    recorder: B::Recorder,
    bound: [Option<Arc<RootBindingLayout<B>>>; 3],
    retained: Retained<B>,
}

impl<B: Backend> Batch<B> {
    pub(crate) fn new(device: Device<B>) -> Self {
        let heap = device.heap().native();
        let mut recorder = device.backend().create_recorder(heap);
        recorder.set_descriptor_heaps(heap);
        Batch {
            device,
            recorder,
            bound: [None, None, None],
            retained: Retained::default(),
        }
    }

    pub fn device(&self) -> &Device<B> {
        &self.device
    }

    fn bound_layout(&self, ty: PipelineType) -> Result<&Arc<RootBindingLayout<B>>, BindError> {
        self.bound[type_index(ty)]
            .as_ref()
            .ok_or(BindError::NoRootLayout(ty))
    }

    /// The root layout currently bound for `ty`.
    pub fn root_layout(&self, ty: PipelineType) -> Option<&Arc<RootBindingLayout<B>>> {
        self.bound[type_index(ty)].as_ref()
    }

    pub fn bind_root_descriptor_layout(
        &mut self,
        ty: PipelineType,
        layout: &Arc<RootBindingLayout<B>>,
    ) -> Result<(), BindError> {
        if layout.pipeline_type() != ty {
            return Err(BindError::WrongPipelineType {
                layout: layout.label().to_string(),
                expected: ty,
                got: layout.pipeline_type(),
            });
        }
        if layout.is_local() {
            return Err(BindError::LocalLayout(layout.label().to_string()));
        }
        self.recorder.set_root_layout(ty, layout.native());
        self.bound[type_index(ty)] = Some(layout.clone());
        self.retained.layouts.push(layout.clone());
        Ok(())
    }

    /**
    Binds the pipeline's current native object.

    The native object is captured now; a later realize does not affect this batch.
    */
    pub fn bind_pipeline(&mut self, pipeline: &Pipeline<B>) -> Result<(), BindError> {
        let ty = pipeline.pipeline_type();
        let bound = self.bound_layout(ty)?;
        if !Arc::ptr_eq(bound, pipeline.root_layout()) {
            return Err(BindError::LayoutNotBound(pipeline.label().to_string()));
        }
        let native = pipeline.native();
        self.recorder.set_pipeline(ty, &native);
        self.retained.pipelines.push(native);
        Ok(())
    }

    /// Binds every table of `set` to its root parameter.  Tables without one are skipped.
    pub fn bind_descriptor_set(
        &mut self,
        ty: PipelineType,
        set: &DescriptorSet<B>,
    ) -> Result<(), BindError> {
        let layout = set.layout().ok_or(BindError::RawSet)?;
        let bound = self.bound_layout(ty)?;
        if !Arc::ptr_eq(bound, layout) {
            return Err(BindError::ForeignSet);
        }
        for table in set.tables() {
            let Some(root_index) = table.root_index else {
                continue;
            };
            self.recorder.set_descriptor_table(ty, root_index, table.gpu);
        }
        self.retained.sets.push(set.clone());
        Ok(())
    }

    /// Writes `data` into the inline constants of push entry `slot`.
    pub fn bind_push_uniform(
        &mut self,
        ty: PipelineType,
        slot: usize,
        data: &[u8],
    ) -> Result<(), BindError> {
        if data.len() % 4 != 0 {
            return Err(BindError::UnalignedPush(data.len()));
        }
        let layout = self.bound_layout(ty)?;
        let (Some(entry), Some(root_index)) = (layout.push_entry(slot), layout.push_root_index(slot))
        else {
            return Err(BindError::PushSlotOutOfRange(slot));
        };
        let capacity = entry.count() as usize;
        if data.len() > capacity {
            return Err(BindError::PushTooLarge {
                slot,
                size: data.len(),
                capacity,
            });
        }
        self.recorder.set_constants(ty, root_index, data);
        Ok(())
    }

    pub fn finish(self) -> RecordedBatch<B> {
        logwise::trace_sync!(
            "Finished batch retaining {sets} sets and {pipelines} pipelines",
            sets = self.retained.sets.len(),
            pipelines = self.retained.pipelines.len()
        );
        RecordedBatch {
            recorder: self.recorder,
            retained: self.retained,
        }
    }
}

impl<B: Backend> std::fmt::Debug for Batch<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("recorder", &self.recorder)
            .field("retained", &self.retained)
            .finish_non_exhaustive()
    }
}

/// A finished batch.  Holds its bound objects until dropped.
#[derive(Debug)]
pub struct RecordedBatch<B: Backend> {
    recorder: B::Recorder,
    retained: Retained<B>,
}

impl<B: Backend> RecordedBatch<B> {
    pub fn recorder(&self) -> &B::Recorder {
        &self.recorder
    }

    pub fn retained(&self) -> &Retained<B> {
        &self.retained
    }

    pub fn into_recorder(self) -> B::Recorder {
        self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::heap::DescriptorHeapInit;
    use crate::bindings::layout::{
        DescriptorKind, DescriptorLayoutEntry, DescriptorSetLayout, LayoutSlot,
        RootBindingLayoutInit,
    };
    use crate::bindings::descriptor_set::DescriptorSetInit;
    use crate::bindings::stages::Stages;
    use crate::bindings::translate::TableStrategy;
    use crate::imp::SoftBackend;
    use crate::imp::soft::SoftCommand;

    fn device() -> Device<SoftBackend> {
        Device::new(
            SoftBackend::new(TableStrategy::PerSlot),
            DescriptorHeapInit::default(),
        )
        .unwrap()
    }

    fn layout(device: &Device<SoftBackend>) -> Arc<RootBindingLayout<SoftBackend>> {
        let mut init = RootBindingLayoutInit::new(PipelineType::Graphics);
        init.push(DescriptorLayoutEntry::new(
            DescriptorKind::PushUniform,
            Stages::VERTEX,
            0,
            16,
        ));
        init.set(
            DescriptorSetLayout::new()
                .with(DescriptorKind::UniformBuffer, Stages::ALL_GRAPHICS, 1, 1)
                .with(DescriptorKind::ResourceTexture, Stages::FRAGMENT, 0, 1),
        );
        device.create_root_descriptor_layout(init).unwrap()
    }

    #[test]
    fn heap_is_bound_first() {
        let device = device();
        let batch = device.begin_batch().finish();
        assert!(matches!(
            batch.recorder().commands().first(),
            Some(SoftCommand::SetDescriptorHeaps { .. })
        ));
    }

    #[test]
    fn push_requires_a_layout() {
        let device = device();
        let mut batch = device.begin_batch();
        assert_eq!(
            batch.bind_push_uniform(PipelineType::Graphics, 0, &[0; 16]),
            Err(BindError::NoRootLayout(PipelineType::Graphics))
        );
    }

    #[test]
    fn push_checks_size_and_slot() {
        let device = device();
        let layout = layout(&device);
        let mut batch = device.begin_batch();
        batch
            .bind_root_descriptor_layout(PipelineType::Graphics, &layout)
            .unwrap();
        assert_eq!(
            batch.bind_push_uniform(PipelineType::Graphics, 0, &[0; 3]),
            Err(BindError::UnalignedPush(3))
        );
        assert_eq!(
            batch.bind_push_uniform(PipelineType::Graphics, 0, &[0; 20]),
            Err(BindError::PushTooLarge {
                slot: 0,
                size: 20,
                capacity: 16
            })
        );
        assert_eq!(
            batch.bind_push_uniform(PipelineType::Graphics, 1, &[0; 4]),
            Err(BindError::PushSlotOutOfRange(1))
        );
        batch
            .bind_push_uniform(PipelineType::Graphics, 0, &[1; 8])
            .unwrap();
        let recorded = batch.finish();
        assert!(recorded.recorder().commands().iter().any(|c| matches!(
            c,
            SoftCommand::SetConstants { root_index: 0, values: 2, .. }
        )));
    }

    #[test]
    fn wrong_type_is_refused() {
        let device = device();
        let layout = layout(&device);
        let mut batch = device.begin_batch();
        assert!(matches!(
            batch.bind_root_descriptor_layout(PipelineType::Compute, &layout),
            Err(BindError::WrongPipelineType { .. })
        ));
        assert!(batch.root_layout(PipelineType::Compute).is_none());
    }

    #[test]
    fn sets_are_retained() {
        let device = device();
        let layout = layout(&device);
        let set = device
            .create_descriptor_set(DescriptorSetInit::Slot {
                layout: layout.clone(),
                slot: LayoutSlot::Set(0),
            })
            .unwrap();
        let mut batch = device.begin_batch();
        batch
            .bind_root_descriptor_layout(PipelineType::Graphics, &layout)
            .unwrap();
        batch
            .bind_descriptor_set(PipelineType::Graphics, &set)
            .unwrap();
        let recorded = batch.finish();
        assert_eq!(recorded.retained().sets.len(), 1);
        let tables = recorded
            .recorder()
            .commands()
            .iter()
            .filter(|c| matches!(c, SoftCommand::SetDescriptorTable { .. }))
            .count();
        assert_eq!(tables, 1);
    }

    #[test]
    fn raw_sets_bind_nothing() {
        let device = device();
        let layout = layout(&device);
        let raw = device
            .create_descriptor_set(DescriptorSetInit::Raw {
                entries: vec![DescriptorLayoutEntry::new(
                    DescriptorKind::ResourceBuffer,
                    Stages::RAYTRACING,
                    0,
                    2,
                )],
            })
            .unwrap();
        let mut batch = device.begin_batch();
        batch
            .bind_root_descriptor_layout(PipelineType::Graphics, &layout)
            .unwrap();
        assert_eq!(
            batch.bind_descriptor_set(PipelineType::Graphics, &raw),
            Err(BindError::RawSet)
        );
    }
}
