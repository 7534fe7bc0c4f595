// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bindings::layout::{DescriptorKind, PipelineType};

/// A native failure reported by a backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Root layout serialization failed: {0}")]
    Serialize(String),
    #[error("Root layout costs {cost} DWORDs, more than the limit of {limit}")]
    RootCost { cost: u32, limit: u32 },
    #[error("Pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("{feature} is not supported by the {backend} backend")]
    Unsupported {
        feature: &'static str,
        backend: &'static str,
    },
    #[error("Pipeline expects a {expected:?} layout, got {got:?}")]
    WrongPipelineType {
        expected: PipelineType,
        got: PipelineType,
    },
    #[error("Handle {0:#x} is outside the heap")]
    BadHandle(u64),
    #[error("Native validation failed: {0}")]
    Validation(String),
    #[error("Can't create {0}")]
    InvalidResource(String),
    #[error("The {backend} backend can't view this object as a {kind:?}: {reason}")]
    IncompatibleView {
        kind: DescriptorKind,
        reason: String,
        backend: &'static str,
    },
    #[error("No such adapter: {0}")]
    NoSuchAdapter(String),
    #[error("Can't create device: {0}")]
    RequestDevice(String),
}
