// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A headless reference backend.

`SoftBackend` keeps descriptor heaps as in-memory view tables and serializes root layouts into a
DWORD blob, enforcing the same 64-DWORD budget a hardware root signature has.  Pipelines are
plain records with an id; the backend counts how many are alive and how many were destroyed, and
batches record into an inspectable command list.

It needs no GPU, which makes it the backend every test runs against.
*/

use crate::bindings::heap::{CpuHandle, DescriptorHeapInit, GpuHandle, Pool};
use crate::bindings::layout::PipelineType;
use crate::bindings::resources::{BufferInit, SamplerInit, TextureInit, ViewDesc};
use crate::bindings::stages::Visibility;
use crate::bindings::translate::{RangeClass, RootLayoutDesc, RootParameter, TableStrategy};
use crate::imp::{Backend, CommandRecorder, Error, PipelineDesc};
use crate::shaders::ShaderStage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

const RESOURCE_INCREMENT: u32 = 32;
const SAMPLER_INCREMENT: u32 = 16;

const RESOURCE_CPU_BASE: u64 = 0x1000_0000;
const SAMPLER_CPU_BASE: u64 = 0x2000_0000;
const RESOURCE_GPU_BASE: u64 = 0x7f00_0000_0000;
const SAMPLER_GPU_BASE: u64 = 0x7f80_0000_0000;

/// Root layout budget, in DWORDs.
pub const ROOT_COST_LIMIT: u32 = 64;
const BLOB_VERSION: u32 = 1;

/// A view as written into a [`SoftHeap`].  Ids refer to soft buffers, textures and samplers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoftView {
    Sampler { id: u64 },
    ConstantBuffer { id: u64, size: u64 },
    ShaderResourceBuffer { id: Option<u64>, stride: u32 },
    UnorderedAccessBuffer { id: Option<u64>, stride: u32 },
    ShaderResourceTexture { id: Option<u64> },
    UnorderedAccessTexture { id: Option<u64> },
}

impl SoftView {
    fn of(view: ViewDesc<'_, SoftBackend>) -> SoftView {
        match view {
            ViewDesc::Sampler(s) => SoftView::Sampler { id: s.id },
            ViewDesc::ConstantBuffer(b, init) => SoftView::ConstantBuffer {
                id: b.id,
                size: init.size,
            },
            ViewDesc::ShaderResourceBuffer(b) => SoftView::ShaderResourceBuffer {
                id: b.map(|(b, _)| b.id),
                stride: b.map(|(_, init)| init.stride).unwrap_or(0),
            },
            ViewDesc::UnorderedAccessBuffer(b) => SoftView::UnorderedAccessBuffer {
                id: b.map(|(b, _)| b.id),
                stride: b.map(|(_, init)| init.stride).unwrap_or(0),
            },
            ViewDesc::ShaderResourceTexture(t) => SoftView::ShaderResourceTexture {
                id: t.map(|(t, _)| t.id),
            },
            ViewDesc::UnorderedAccessTexture(t) => SoftView::UnorderedAccessTexture {
                id: t.map(|(t, _)| t.id),
            },
        }
    }

    fn pool(&self) -> Pool {
        match self {
            SoftView::Sampler { .. } => Pool::Samplers,
            _ => Pool::Resources,
        }
    }
}

pub struct SoftHeap {
    resources: wasm_safe_mutex::Mutex<Vec<Option<SoftView>>>,
    samplers: wasm_safe_mutex::Mutex<Vec<Option<SoftView>>>,
    writes: AtomicUsize,
}

impl SoftHeap {
    fn table(&self, pool: Pool) -> &wasm_safe_mutex::Mutex<Vec<Option<SoftView>>> {
        match pool {
            Pool::Resources => &self.resources,
            Pool::Samplers => &self.samplers,
        }
    }

    /// The view at `index`, or `None` if nothing was written there.
    pub fn view(&self, pool: Pool, index: u32) -> Option<SoftView> {
        self.table(pool)
            .lock_sync()
            .get(index as usize)
            .copied()
            .flatten()
    }

    /// Total number of views written into this heap.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SoftHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftHeap")
            .field("writes", &self.writes())
            .finish_non_exhaustive()
    }
}

/// A serialized root layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftRootLayout {
    pub blob: Vec<u32>,
    pub cost: u32,
    pub pipeline_type: PipelineType,
    pub parameter_count: usize,
}

#[derive(Debug)]
pub struct SoftPipeline {
    pub id: u64,
    pub label: String,
    pub pipeline_type: PipelineType,
    /// Generation of the link this pipeline was built from.
    pub program_generation: u64,
    counters: Arc<Counters>,
}

impl Drop for SoftPipeline {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::Relaxed);
        self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftBuffer {
    pub id: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftSampler {
    pub id: u64,
}

/// A bind call, as recorded by [`SoftRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftCommand {
    SetDescriptorHeaps {
        resources: GpuHandle,
        samplers: GpuHandle,
    },
    SetRootLayout {
        ty: PipelineType,
        parameter_count: usize,
    },
    SetPipeline {
        ty: PipelineType,
        id: u64,
    },
    SetDescriptorTable {
        ty: PipelineType,
        root_index: u32,
        table: GpuHandle,
    },
    SetConstants {
        ty: PipelineType,
        root_index: u32,
        values: u32,
        data: Vec<u8>,
    },
}

#[derive(Debug, Default)]
pub struct SoftRecorder {
    commands: Vec<SoftCommand>,
}

impl SoftRecorder {
    pub fn commands(&self) -> &[SoftCommand] {
        &self.commands
    }
}

impl CommandRecorder<SoftBackend> for SoftRecorder {
    fn set_descriptor_heaps(&mut self, _heap: &SoftHeap) {
        self.commands.push(SoftCommand::SetDescriptorHeaps {
            resources: GpuHandle(RESOURCE_GPU_BASE),
            samplers: GpuHandle(SAMPLER_GPU_BASE),
        });
    }

    fn set_root_layout(&mut self, ty: PipelineType, layout: &Arc<SoftRootLayout>) {
        self.commands.push(SoftCommand::SetRootLayout {
            ty,
            parameter_count: layout.parameter_count,
        });
    }

    fn set_pipeline(&mut self, ty: PipelineType, pipeline: &Arc<SoftPipeline>) {
        self.commands.push(SoftCommand::SetPipeline {
            ty,
            id: pipeline.id,
        });
    }

    fn set_descriptor_table(&mut self, ty: PipelineType, root_index: u32, table: GpuHandle) {
        self.commands.push(SoftCommand::SetDescriptorTable {
            ty,
            root_index,
            table,
        });
    }

    fn set_constants(&mut self, ty: PipelineType, root_index: u32, data: &[u8]) {
        self.commands.push(SoftCommand::SetConstants {
            ty,
            root_index,
            values: (data.len() / 4) as u32,
            data: data.to_vec(),
        });
    }
}

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    destroyed: AtomicUsize,
    created: AtomicUsize,
}

#[derive(Debug)]
pub struct SoftBackend {
    strategy: TableStrategy,
    next_id: AtomicU64,
    counters: Arc<Counters>,
    fail_next_pipeline: AtomicBool,
}

fn visibility_code(visibility: Visibility) -> u32 {
    match visibility {
        Visibility::All => 0,
        Visibility::Vertex => 1,
        Visibility::Hull => 2,
        Visibility::Domain => 3,
        Visibility::Geometry => 4,
        Visibility::Fragment => 5,
    }
}

fn class_code(class: RangeClass) -> u32 {
    match class {
        RangeClass::ShaderResource => 0,
        RangeClass::UnorderedAccess => 1,
        RangeClass::ConstantBuffer => 2,
        RangeClass::Sampler => 3,
    }
}

/// Serializes `desc` into `[version, flags, count, parameters...]`.
fn serialize(desc: &RootLayoutDesc) -> Result<(Vec<u32>, u32), Error> {
    let mut cost = 0;
    let mut blob = vec![
        BLOB_VERSION,
        desc.local as u32,
        desc.parameters.len() as u32,
    ];
    for (index, parameter) in desc.parameters.iter().enumerate() {
        match parameter {
            RootParameter::Constants {
                register,
                num_values,
                visibility,
            } => {
                cost += num_values;
                blob.extend([0, *register, *num_values, visibility_code(*visibility)]);
            }
            RootParameter::Table {
                pool,
                ranges,
                visibility,
            } => {
                cost += 1;
                blob.extend([1, ranges.len() as u32, visibility_code(*visibility)]);
                for range in ranges {
                    let is_sampler = range.class() == RangeClass::Sampler;
                    if is_sampler != (*pool == Pool::Samplers) {
                        return Err(Error::Serialize(format!(
                            "parameter {index} mixes samplers and resource views"
                        )));
                    }
                    blob.extend([
                        class_code(range.class()),
                        range.base_register,
                        range.count,
                        range.offset,
                    ]);
                }
            }
        }
    }
    if cost > ROOT_COST_LIMIT {
        return Err(Error::RootCost {
            cost,
            limit: ROOT_COST_LIMIT,
        });
    }
    Ok((blob, cost))
}

impl SoftBackend {
    pub fn new(strategy: TableStrategy) -> Self {
        SoftBackend {
            strategy,
            next_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
            fail_next_pipeline: AtomicBool::new(false),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Makes the next pipeline creation fail, as a driver rejecting the program would.
    pub fn fail_next_pipeline(&self) {
        self.fail_next_pipeline.store(true, Ordering::Relaxed);
    }

    /// Native pipelines currently alive.
    pub fn live_pipelines(&self) -> usize {
        self.counters.live.load(Ordering::Relaxed)
    }

    pub fn destroyed_pipelines(&self) -> usize {
        self.counters.destroyed.load(Ordering::Relaxed)
    }

    pub fn created_pipelines(&self) -> usize {
        self.counters.created.load(Ordering::Relaxed)
    }
}

impl Backend for SoftBackend {
    type Heap = SoftHeap;
    type RootLayout = SoftRootLayout;
    type Pipeline = SoftPipeline;
    type Buffer = SoftBuffer;
    type Texture = SoftTexture;
    type Sampler = SoftSampler;
    type Recorder = SoftRecorder;

    fn name(&self) -> &'static str {
        "soft"
    }

    fn table_strategy(&self) -> TableStrategy {
        self.strategy
    }

    fn increment(&self, pool: Pool) -> u32 {
        match pool {
            Pool::Resources => RESOURCE_INCREMENT,
            Pool::Samplers => SAMPLER_INCREMENT,
        }
    }

    fn create_heap(&self, init: &DescriptorHeapInit) -> Result<SoftHeap, Error> {
        Ok(SoftHeap {
            resources: wasm_safe_mutex::Mutex::new(vec![None; init.num_descriptors as usize]),
            samplers: wasm_safe_mutex::Mutex::new(vec![None; init.num_samplers as usize]),
            writes: AtomicUsize::new(0),
        })
    }

    fn heap_bases(&self, _heap: &SoftHeap, pool: Pool) -> (CpuHandle, GpuHandle) {
        match pool {
            Pool::Resources => (CpuHandle(RESOURCE_CPU_BASE), GpuHandle(RESOURCE_GPU_BASE)),
            Pool::Samplers => (CpuHandle(SAMPLER_CPU_BASE), GpuHandle(SAMPLER_GPU_BASE)),
        }
    }

    fn create_root_layout(&self, desc: &RootLayoutDesc) -> Result<SoftRootLayout, Error> {
        let (blob, cost) = serialize(desc)?;
        Ok(SoftRootLayout {
            blob,
            cost,
            pipeline_type: desc.pipeline_type,
            parameter_count: desc.parameters.len(),
        })
    }

    fn write_view(
        &self,
        heap: &SoftHeap,
        pool: Pool,
        at: CpuHandle,
        view: ViewDesc<'_, Self>,
    ) -> Result<(), Error> {
        let view = SoftView::of(view);
        if view.pool() != pool {
            return Err(Error::BadHandle(at.0));
        }
        let (base, _) = self.heap_bases(heap, pool);
        let increment = self.increment(pool) as u64;
        let offset = at.0.checked_sub(base.0).ok_or(Error::BadHandle(at.0))?;
        if offset % increment != 0 {
            return Err(Error::BadHandle(at.0));
        }
        let mut table = heap.table(pool).lock_sync();
        let slot = table
            .get_mut((offset / increment) as usize)
            .ok_or(Error::BadHandle(at.0))?;
        *slot = Some(view);
        heap.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_pipeline(&self, desc: PipelineDesc<'_, Self>) -> Result<SoftPipeline, Error> {
        if self.fail_next_pipeline.swap(false, Ordering::Relaxed) {
            return Err(Error::Pipeline(format!("{} was rejected by the driver", desc.label)));
        }
        let ty = desc.init.pipeline_type();
        let layout_type = desc.init.root_layout().native().pipeline_type;
        if layout_type != ty {
            return Err(Error::WrongPipelineType {
                expected: ty,
                got: layout_type,
            });
        }
        let required = match ty {
            PipelineType::Graphics => ShaderStage::Vertex,
            PipelineType::Compute => ShaderStage::Compute,
            PipelineType::Raytracing => ShaderStage::RayGeneration,
        };
        if desc.program.stage(required).is_none() {
            return Err(Error::Pipeline(format!(
                "program {} has no {required:?} stage",
                desc.program.label()
            )));
        }
        self.counters.live.fetch_add(1, Ordering::Relaxed);
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        Ok(SoftPipeline {
            id: self.next_id(),
            label: desc.label.to_string(),
            pipeline_type: ty,
            program_generation: desc.program.generation(),
            counters: self.counters.clone(),
        })
    }

    fn create_buffer(&self, init: &BufferInit) -> Result<SoftBuffer, Error> {
        Ok(SoftBuffer {
            id: self.next_id(),
            size: init.size,
        })
    }

    fn create_texture(&self, init: &TextureInit) -> Result<SoftTexture, Error> {
        init.check()?;
        Ok(SoftTexture {
            id: self.next_id(),
            width: init.width,
            height: init.height,
        })
    }

    fn create_sampler(&self, _init: &SamplerInit) -> Result<SoftSampler, Error> {
        Ok(SoftSampler { id: self.next_id() })
    }

    fn create_recorder(&self, _heap: &SoftHeap) -> SoftRecorder {
        SoftRecorder::default()
    }

    fn wait_idle(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::layout::DescriptorKind;
    use crate::bindings::translate::DescriptorRange;

    fn desc(parameters: Vec<RootParameter>) -> RootLayoutDesc {
        RootLayoutDesc {
            label: "test".to_string(),
            pipeline_type: PipelineType::Graphics,
            local: false,
            parameters,
        }
    }

    #[test]
    fn blob_starts_with_header() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let layout = backend
            .create_root_layout(&desc(vec![RootParameter::Constants {
                register: 0,
                num_values: 4,
                visibility: Visibility::Vertex,
            }]))
            .unwrap();
        assert_eq!(&layout.blob[..3], &[BLOB_VERSION, 0, 1]);
        assert_eq!(layout.cost, 4);
    }

    #[test]
    fn cost_limit_is_enforced() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let result = backend.create_root_layout(&desc(vec![RootParameter::Constants {
            register: 0,
            num_values: 65,
            visibility: Visibility::All,
        }]));
        assert!(matches!(result, Err(Error::RootCost { cost: 65, limit: 64 })));
    }

    #[test]
    fn samplers_stay_out_of_resource_tables() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let result = backend.create_root_layout(&desc(vec![RootParameter::Table {
            pool: Pool::Resources,
            ranges: vec![DescriptorRange {
                kind: DescriptorKind::Sampler,
                base_register: 0,
                count: 1,
                offset: 0,
            }],
            visibility: Visibility::Fragment,
        }]));
        assert!(matches!(result, Err(Error::Serialize(_))));
    }

    #[test]
    fn writes_land_at_the_handle() {
        let backend = SoftBackend::new(TableStrategy::PerSlot);
        let heap = backend
            .create_heap(&DescriptorHeapInit {
                num_descriptors: 4,
                num_samplers: 1,
            })
            .unwrap();
        let sampler = SoftSampler { id: 9 };
        backend
            .write_view(
                &heap,
                Pool::Samplers,
                CpuHandle(SAMPLER_CPU_BASE),
                ViewDesc::Sampler(&sampler),
            )
            .unwrap();
        assert_eq!(heap.view(Pool::Samplers, 0), Some(SoftView::Sampler { id: 9 }));
        let outside = CpuHandle(SAMPLER_CPU_BASE + SAMPLER_INCREMENT as u64);
        assert!(matches!(
            backend.write_view(&heap, Pool::Samplers, outside, ViewDesc::Sampler(&sampler)),
            Err(Error::BadHandle(_))
        ));
        assert_eq!(heap.writes(), 1);
    }
}
