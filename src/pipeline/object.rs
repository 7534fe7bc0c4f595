// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pipelines whose native object can be rebuilt in place.

A [`Pipeline`] keeps its identity for its whole life; only the native object behind it changes.
[`Pipeline::realize`] builds a new native pipeline from the program's current link.  On success
the new object replaces the old one and the old one goes to the device's retired list.  On
failure nothing changes and the last good native pipeline stays in use.

Readers take an `Arc` of the native object, so a batch that bound the pipeline before a swap
keeps the object it bound.
*/

use crate::bindings::layout::PipelineType;
use crate::bindings::root_layout::RootBindingLayout;
use crate::device::DeviceShared;
use crate::imp::{self, Backend, PipelineDesc};
use crate::pipeline::state::PipelineInit;
use crate::watcher::arena::{PipelineKey, WatchSlot};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RealizeError {
    #[error("Layout {layout} is for {got:?} pipelines, expected {expected:?}")]
    WrongLayoutType {
        layout: String,
        expected: PipelineType,
        got: PipelineType,
    },
    #[error("Layout {0} is local and can't be a pipeline's root layout")]
    LocalRootLayout(String),
    #[error("Layout {0} is used as a local layout but was not built as one")]
    GlobalLocalLayout(String),
    #[error("Can't realize pipeline {0}")]
    Native(#[from] imp::Error),
}

fn check_root<B: Backend>(
    layout: &RootBindingLayout<B>,
    expected: PipelineType,
) -> Result<(), RealizeError> {
    if layout.pipeline_type() != expected {
        return Err(RealizeError::WrongLayoutType {
            layout: layout.label().to_string(),
            expected,
            got: layout.pipeline_type(),
        });
    }
    if layout.is_local() {
        return Err(RealizeError::LocalRootLayout(layout.label().to_string()));
    }
    Ok(())
}

fn validate<B: Backend>(init: &PipelineInit<B>) -> Result<(), RealizeError> {
    check_root(init.root_layout(), init.pipeline_type())?;
    if let PipelineInit::Raytracing(rt) = init {
        for local in &rt.local_layouts {
            if !local.layout.is_local() {
                return Err(RealizeError::GlobalLocalLayout(
                    local.layout.label().to_string(),
                ));
            }
        }
    }
    Ok(())
}

pub(crate) struct PipelineObject<B: Backend> {
    label: String,
    init: PipelineInit<B>,
    native: wasm_safe_mutex::Mutex<Arc<B::Pipeline>>,
    device: Arc<DeviceShared<B>>,
    realizes: AtomicU64,
}

impl<B: Backend> PipelineObject<B> {
    fn build(
        device: &DeviceShared<B>,
        label: &str,
        init: &PipelineInit<B>,
    ) -> Result<B::Pipeline, RealizeError> {
        let program = init.program().linked();
        device
            .backend()
            .create_pipeline(PipelineDesc {
                label,
                init,
                program: &program,
            })
            .map_err(RealizeError::Native)
    }

    pub(crate) fn realize(&self) -> Result<(), RealizeError> {
        self.realizes.fetch_add(1, Ordering::Relaxed);
        match Self::build(&self.device, &self.label, &self.init) {
            Ok(native) => {
                let previous = std::mem::replace(&mut *self.native.lock_sync(), Arc::new(native));
                self.device.retire(previous);
                logwise::info_sync!("Realized pipeline {label}", label = self.label.clone());
                Ok(())
            }
            Err(e) => {
                logwise::error_sync!(
                    "Pipeline {label} failed to realize, keeping the previous pipeline: {error}",
                    label = self.label.clone(),
                    error = e.to_string()
                );
                Err(e)
            }
        }
    }

    pub(crate) fn native(&self) -> Arc<B::Pipeline> {
        self.native.lock_sync().clone()
    }
}

struct PipelineShared<B: Backend> {
    object: Arc<PipelineObject<B>>,
    watch: WatchSlot<PipelineKey, PipelineObject<B>>,
}

/// A pipeline state object.  Clones share the same pipeline.
pub struct Pipeline<B: Backend> {
    shared: Arc<PipelineShared<B>>,
}

impl<B: Backend> Clone for Pipeline<B> {
    fn clone(&self) -> Self {
        Pipeline {
            shared: self.shared.clone(),
        }
    }
}

impl<B: Backend> Pipeline<B> {
    pub(crate) fn new(
        device: Arc<DeviceShared<B>>,
        label: String,
        init: PipelineInit<B>,
    ) -> Result<Self, RealizeError> {
        validate(&init)?;
        let native = PipelineObject::build(&device, &label, &init).inspect_err(|e| {
            logwise::error_sync!(
                "Can't create pipeline {label}: {error}",
                label = label.clone(),
                error = e.to_string()
            );
        })?;
        Ok(Pipeline {
            shared: Arc::new(PipelineShared {
                object: Arc::new(PipelineObject {
                    label,
                    init,
                    native: wasm_safe_mutex::Mutex::new(Arc::new(native)),
                    device,
                    realizes: AtomicU64::new(0),
                }),
                watch: WatchSlot::new(),
            }),
        })
    }

    /**
    Rebuilds the native pipeline from the program's current link.

    On failure the previous native pipeline stays in place and the error is returned.
    */
    pub fn realize(&self) -> Result<(), RealizeError> {
        self.shared.object.realize()
    }

    /// The current native pipeline.
    pub fn native(&self) -> Arc<B::Pipeline> {
        self.shared.object.native()
    }

    pub fn label(&self) -> &str {
        &self.shared.object.label
    }

    pub fn init(&self) -> &PipelineInit<B> {
        &self.shared.object.init
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.shared.object.init.pipeline_type()
    }

    pub fn root_layout(&self) -> &Arc<RootBindingLayout<B>> {
        self.shared.object.init.root_layout()
    }

    /// Number of calls to realize, including failed ones.
    pub fn realize_count(&self) -> u64 {
        self.shared.object.realizes.load(Ordering::Relaxed)
    }

    pub(crate) fn object(&self) -> &Arc<PipelineObject<B>> {
        &self.shared.object
    }

    pub(crate) fn watch_slot(&self) -> &WatchSlot<PipelineKey, PipelineObject<B>> {
        &self.shared.watch
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<B: Backend> std::fmt::Debug for Pipeline<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.shared.object.label)
            .field("init", &self.shared.object.init)
            .field("watch", &self.shared.watch)
            .finish()
    }
}
