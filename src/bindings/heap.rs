// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The shader-visible descriptor heap.

A [`DescriptorHeap`] owns two pools of native descriptor storage: one for resource views
(constant buffers, shader resources, unordered access views) and one for samplers.  Descriptor
sets carve contiguous ranges out of these pools at creation time.

Handles into the heap are addresses: `base + index * increment`, where the increment is the
backend's per-descriptor stride, queried once when the heap is created.  CPU handles are used to
write views, GPU handles are used to bind tables.

The heap is append-only.  A range, once handed out, stays reserved for the heap's lifetime, and
running out is an explicit [`AllocError`].
*/

use crate::bindings::index_allocator::{Exhausted, IndexAllocator};
use crate::imp::{self, Backend};
use std::fmt::Display;

/// Capacity of each pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorHeapInit {
    pub num_descriptors: u32,
    pub num_samplers: u32,
}

impl Default for DescriptorHeapInit {
    fn default() -> Self {
        DescriptorHeapInit {
            num_descriptors: 4096,
            num_samplers: 256,
        }
    }
}

/// One of the two pools in a heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pool {
    Resources,
    Samplers,
}

impl Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pool::Resources => write!(f, "resource"),
            Pool::Samplers => write!(f, "sampler"),
        }
    }
}

/// Address used to write a view into the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuHandle(pub u64);

/// Address used to bind a table that starts at this descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

impl CpuHandle {
    pub const fn offset(self, index: u32, increment: u32) -> CpuHandle {
        CpuHandle(self.0 + index as u64 * increment as u64)
    }
}

impl GpuHandle {
    pub const fn offset(self, index: u32, increment: u32) -> GpuHandle {
        GpuHandle(self.0 + index as u64 * increment as u64)
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AllocError {
    #[error("Descriptor heap exhausted: {requested} {pool} descriptors requested, {available} available")]
    Exhausted {
        pool: Pool,
        requested: u32,
        available: u32,
    },
}

/// Snapshot of how much of each pool has been handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapUsage {
    pub descriptors_allocated: u32,
    pub descriptors_capacity: u32,
    pub samplers_allocated: u32,
    pub samplers_capacity: u32,
}

#[derive(Debug)]
struct PoolState {
    allocator: IndexAllocator,
    increment: u32,
    cpu_base: CpuHandle,
    gpu_base: GpuHandle,
}

/// The shader-visible heap of a device.
pub struct DescriptorHeap<B: Backend> {
    native: B::Heap,
    resources: PoolState,
    samplers: PoolState,
}

impl<B: Backend> DescriptorHeap<B> {
    /// Creates the native heap and queries its increments and base addresses.
    pub fn new(backend: &B, init: DescriptorHeapInit) -> Result<Self, imp::Error> {
        let native = backend.create_heap(&init)?;
        let pool_state = |pool: Pool, capacity: u32| {
            let (cpu_base, gpu_base) = backend.heap_bases(&native, pool);
            PoolState {
                allocator: IndexAllocator::new(capacity),
                increment: backend.increment(pool),
                cpu_base,
                gpu_base,
            }
        };
        let resources = pool_state(Pool::Resources, init.num_descriptors);
        let samplers = pool_state(Pool::Samplers, init.num_samplers);
        logwise::info_sync!(
            "Created descriptor heap with {descriptors} descriptors and {samplers} samplers",
            descriptors = init.num_descriptors,
            samplers = init.num_samplers
        );
        Ok(DescriptorHeap {
            native,
            resources,
            samplers,
        })
    }

    fn pool(&self, pool: Pool) -> &PoolState {
        match pool {
            Pool::Resources => &self.resources,
            Pool::Samplers => &self.samplers,
        }
    }

    /**
    Reserves `n` consecutive slots in `pool` and returns the index of the first.

    Requesting zero slots returns the current cursor and reserves nothing.
    */
    pub fn allocate(&self, pool: Pool, n: u32) -> Result<u32, AllocError> {
        self.pool(pool)
            .allocator
            .allocate_contiguous(n)
            .map_err(|Exhausted { requested, available }| {
                logwise::error_sync!(
                    "Descriptor heap exhausted: {pool} pool needs {requested}, {available} left",
                    pool = pool.to_string(),
                    requested = requested,
                    available = available
                );
                AllocError::Exhausted {
                    pool,
                    requested,
                    available,
                }
            })
    }

    pub fn allocate_descriptors(&self, n: u32) -> Result<u32, AllocError> {
        self.allocate(Pool::Resources, n)
    }

    pub fn allocate_samplers(&self, n: u32) -> Result<u32, AllocError> {
        self.allocate(Pool::Samplers, n)
    }

    /// Per-descriptor stride of `pool`.
    pub fn increment(&self, pool: Pool) -> u32 {
        self.pool(pool).increment
    }

    pub fn cpu_handle(&self, pool: Pool, index: u32) -> CpuHandle {
        let state = self.pool(pool);
        state.cpu_base.offset(index, state.increment)
    }

    pub fn gpu_handle(&self, pool: Pool, index: u32) -> GpuHandle {
        let state = self.pool(pool);
        state.gpu_base.offset(index, state.increment)
    }

    pub fn usage(&self) -> HeapUsage {
        HeapUsage {
            descriptors_allocated: self.resources.allocator.allocated(),
            descriptors_capacity: self.resources.allocator.capacity(),
            samplers_allocated: self.samplers.allocator.allocated(),
            samplers_capacity: self.samplers.allocator.capacity(),
        }
    }

    pub fn native(&self) -> &B::Heap {
        &self.native
    }
}

impl<B: Backend> std::fmt::Debug for DescriptorHeap<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("resources", &self.resources)
            .field("samplers", &self.samplers)
            .finish_non_exhaustive()
    }
}
