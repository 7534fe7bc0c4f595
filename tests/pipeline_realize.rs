// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Realizing pipelines in place, and the lifetime of the native objects they replace.

use roots_and_heaps::bindings::{
    DescriptorHeapInit, DescriptorKind, DescriptorSetLayout, PipelineType, RootBindingLayout,
    RootBindingLayoutInit, Stages, TableStrategy, TextureFormat,
};
use roots_and_heaps::imp::SoftBackend;
use roots_and_heaps::pipeline::{
    ComputeState, GraphicsState, HitGroup, LocalLayout, RaytracingState,
};
use roots_and_heaps::shaders::{ShaderDesc, ShaderStage, SourceCompiler, StageLinker};
use roots_and_heaps::{Device, Pipeline, Program, RealizeError, Shader};
use std::sync::Arc;

fn device() -> Device<SoftBackend> {
    Device::new(
        SoftBackend::new(TableStrategy::PerEntry),
        DescriptorHeapInit::default(),
    )
    .unwrap()
}

fn layout(device: &Device<SoftBackend>, ty: PipelineType) -> Arc<RootBindingLayout<SoftBackend>> {
    let mut init = RootBindingLayoutInit::new(ty);
    init.set(DescriptorSetLayout::new().with(
        DescriptorKind::UniformBuffer,
        Stages::VERTEX | Stages::COMPUTE,
        0,
        1,
    ));
    device.create_root_descriptor_layout(init).unwrap()
}

fn shader(stage: ShaderStage, entry_point: &str) -> Shader {
    Shader::new(
        ShaderDesc::new(entry_point, stage, entry_point),
        &format!("fn {entry_point}() {{}}"),
        Arc::new(SourceCompiler),
    )
    .unwrap()
}

fn graphics_program() -> Program {
    Program::new(
        "triangle",
        vec![
            shader(ShaderStage::Vertex, "vs_main"),
            shader(ShaderStage::Fragment, "fs_main"),
        ],
        Arc::new(StageLinker),
    )
    .unwrap()
}

fn graphics_pipeline(device: &Device<SoftBackend>) -> Pipeline<SoftBackend> {
    let state = GraphicsState::new(
        graphics_program(),
        layout(device, PipelineType::Graphics),
        TextureFormat::Bgra8UnormSrgb,
    );
    device.create_graphics_pipeline_state("triangle", state).unwrap()
}

#[test]
fn realize_swaps_the_native_pipeline() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    let before = pipeline.native().id;
    pipeline.realize().unwrap();
    let after = pipeline.native().id;
    assert_ne!(before, after);
    assert_eq!(pipeline.realize_count(), 1);
    assert_eq!(device.backend().created_pipelines(), 2);
}

#[test]
fn replaced_pipelines_live_until_drained() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    pipeline.realize().unwrap();
    pipeline.realize().unwrap();

    assert_eq!(device.retired_count(), 2);
    assert_eq!(device.backend().live_pipelines(), 3);
    assert_eq!(device.backend().destroyed_pipelines(), 0);

    assert_eq!(device.drain_retired(), 2);
    assert_eq!(device.retired_count(), 0);
    assert_eq!(device.backend().live_pipelines(), 1);
    assert_eq!(device.backend().destroyed_pipelines(), 2);
}

#[test]
fn a_held_native_pipeline_outlives_the_drain() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    let held = pipeline.native();
    pipeline.realize().unwrap();
    device.drain_retired();
    assert_eq!(device.backend().destroyed_pipelines(), 0);
    drop(held);
    assert_eq!(device.backend().destroyed_pipelines(), 1);
}

#[test]
fn failed_realize_keeps_the_last_good_pipeline() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    let before = pipeline.native().id;

    device.backend().fail_next_pipeline();
    let err = pipeline.realize().unwrap_err();
    assert!(matches!(err, RealizeError::Native(_)));
    assert_eq!(pipeline.native().id, before);
    assert_eq!(pipeline.realize_count(), 1);
    assert_eq!(device.retired_count(), 0);

    //the failure was one-shot
    pipeline.realize().unwrap();
    assert_ne!(pipeline.native().id, before);
}

#[test]
fn realize_picks_up_the_current_link() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    let program = pipeline.init().program().clone();
    assert_eq!(pipeline.native().program_generation, 1);

    program.shaders()[0].recompile("fn vs_main() { /* edited */ }").unwrap();
    program.relink().unwrap();
    pipeline.realize().unwrap();
    assert_eq!(pipeline.native().program_generation, 2);
}

#[test]
fn layout_type_must_match() {
    let device = device();
    let state = GraphicsState::new(
        graphics_program(),
        layout(&device, PipelineType::Compute),
        TextureFormat::Rgba8Unorm,
    );
    let err = device
        .create_graphics_pipeline_state("mismatch", state)
        .unwrap_err();
    assert!(matches!(
        err,
        RealizeError::WrongLayoutType {
            expected: PipelineType::Graphics,
            got: PipelineType::Compute,
            ..
        }
    ));
    assert_eq!(device.backend().created_pipelines(), 0);
}

#[test]
fn compute_needs_a_compute_stage() {
    let device = device();
    let vertex_only = Program::new(
        "vertex only",
        vec![shader(ShaderStage::Vertex, "vs_main")],
        Arc::new(StageLinker),
    )
    .unwrap();
    let state = ComputeState {
        program: vertex_only,
        layout: layout(&device, PipelineType::Compute),
    };
    assert!(device.create_compute_pipeline_state("bad", state).is_err());

    let compute = Program::new(
        "blur",
        vec![shader(ShaderStage::Compute, "cs_main")],
        Arc::new(StageLinker),
    )
    .unwrap();
    let state = ComputeState {
        program: compute,
        layout: layout(&device, PipelineType::Compute),
    };
    let pipeline = device.create_compute_pipeline_state("blur", state).unwrap();
    assert_eq!(pipeline.pipeline_type(), PipelineType::Compute);
}

#[test]
fn batches_keep_bound_pipelines_alive() {
    let device = device();
    let pipeline = graphics_pipeline(&device);
    let mut batch = device.begin_batch();
    batch
        .bind_root_descriptor_layout(PipelineType::Graphics, pipeline.root_layout())
        .unwrap();
    batch.bind_pipeline(&pipeline).unwrap();
    let recorded = batch.finish();

    pipeline.realize().unwrap();
    device.drain_retired();
    //the batch still holds the pipeline it bound
    assert_eq!(device.backend().destroyed_pipelines(), 0);
    drop(recorded);
    assert_eq!(device.backend().destroyed_pipelines(), 1);
}

fn raytracing_layout(device: &Device<SoftBackend>, local: bool) -> Arc<RootBindingLayout<SoftBackend>> {
    let mut init = RootBindingLayoutInit::new(PipelineType::Raytracing);
    init.local(local);
    init.set(DescriptorSetLayout::new().with(
        DescriptorKind::ResourceBuffer,
        Stages::RAYTRACING,
        0,
        1,
    ));
    device.create_root_descriptor_layout(init).unwrap()
}

fn raytracing_state(
    global_layout: Arc<RootBindingLayout<SoftBackend>>,
    local_layouts: Vec<LocalLayout<SoftBackend>>,
) -> RaytracingState<SoftBackend> {
    let program = Program::new(
        "trace",
        vec![
            shader(ShaderStage::RayGeneration, "raygen"),
            shader(ShaderStage::Miss, "miss"),
            shader(ShaderStage::ClosestHit, "closest"),
        ],
        Arc::new(StageLinker),
    )
    .unwrap();
    RaytracingState {
        program,
        global_layout,
        local_layouts,
        hit_groups: vec![HitGroup {
            name: "opaque".to_string(),
            closest_hit: Some("closest".to_string()),
            any_hit: None,
            intersection: None,
        }],
        max_recursion_depth: 1,
        max_payload_size: 16,
        max_attribute_size: 8,
    }
}

#[test]
fn raytracing_pipelines_realize() {
    let device = device();
    let local = LocalLayout {
        layout: raytracing_layout(&device, true),
        exports: vec!["opaque".to_string()],
    };
    let state = raytracing_state(raytracing_layout(&device, false), vec![local]);
    let pipeline = device.create_raytracing_pipeline_state("trace", state).unwrap();
    assert_eq!(pipeline.pipeline_type(), PipelineType::Raytracing);
    let before = pipeline.native().id;
    pipeline.realize().unwrap();
    assert_ne!(pipeline.native().id, before);
    assert_eq!(device.backend().created_pipelines(), 2);
}

#[test]
fn local_layouts_cannot_be_the_global_layout() {
    let device = device();
    let state = raytracing_state(raytracing_layout(&device, true), Vec::new());
    let err = device
        .create_raytracing_pipeline_state("trace", state)
        .unwrap_err();
    assert!(matches!(err, RealizeError::LocalRootLayout(_)));
    assert_eq!(device.backend().created_pipelines(), 0);
}

#[test]
fn global_layouts_cannot_be_local_layouts() {
    let device = device();
    let misused = LocalLayout {
        layout: raytracing_layout(&device, false),
        exports: vec!["opaque".to_string()],
    };
    let state = raytracing_state(raytracing_layout(&device, false), vec![misused]);
    let err = device
        .create_raytracing_pipeline_state("trace", state)
        .unwrap_err();
    assert!(matches!(err, RealizeError::GlobalLocalLayout(_)));
    assert_eq!(device.backend().created_pipelines(), 0);
}
