// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bindings::resources::{AddressMode, SamplerInit, SamplerType};
use wgpu::SamplerDescriptor;

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

pub(super) fn create_sampler(device: &wgpu::Device, init: &SamplerInit) -> wgpu::Sampler {
    let min_filter = match init.sampler_type {
        SamplerType::Mipmapped => wgpu::FilterMode::Linear,
        SamplerType::PixelLinear => wgpu::FilterMode::Linear,
    };

    let mag_filter = match init.sampler_type {
        SamplerType::Mipmapped => wgpu::FilterMode::Linear,
        SamplerType::PixelLinear => wgpu::FilterMode::Nearest,
    };

    let mipmap_filter = match init.sampler_type {
        SamplerType::Mipmapped => wgpu::FilterMode::Linear,
        SamplerType::PixelLinear => wgpu::FilterMode::Nearest,
    };

    let address_mode = address_mode(init.address_mode);
    let s = SamplerDescriptor {
        label: Some(&init.label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter,
        min_filter,
        mipmap_filter,
        lod_min_clamp: 0.0,
        lod_max_clamp: 14.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    };
    device.create_sampler(&s)
}
