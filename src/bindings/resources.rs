// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Resource objects that can be written into descriptor sets.

[`Buffer`], [`Texture`] and [`Sampler`] are cheap, clonable handles around a backend-native
object.  A descriptor set stores the [`BoundObject`]s it was last updated with, which keeps the
underlying resources alive for as long as the set (or any other holder) needs them.
*/

use crate::bindings::layout::DescriptorKind;
use crate::imp::{Backend, Error};
use std::fmt::Debug;
use std::sync::Arc;

/// How shaders access a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Read as a constant buffer.
    Uniform,
    /// Read as a structured buffer.
    ShaderRead,
    /// Read and written as an unordered access buffer.
    ShaderReadWrite,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferInit {
    pub label: String,
    /// Size in bytes.
    pub size: u64,
    /// Element stride in bytes, for structured views.  Zero for raw buffers.
    pub stride: u32,
    pub usage: BufferUsage,
}

impl BufferInit {
    pub fn new(label: impl Into<String>, size: u64, usage: BufferUsage) -> Self {
        BufferInit {
            label: label.into(),
            size,
            stride: 0,
            usage,
        }
    }

    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    Rgba16Float,
    R32Float,
    Depth32Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Sampled or read as a shader resource.
    Sampled,
    /// Read and written as an unordered access texture.
    Storage,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureInit {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureInit {
    /// Rejects format and usage pairs no backend can create.
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.usage == TextureUsage::Storage && self.format == TextureFormat::Depth32Float {
            return Err(Error::InvalidResource(format!(
                "{}: depth textures can't be storage textures",
                self.label
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    ///The sampler shall use normalized coordinates, and will do interpolation for mipmapping.
    Mipmapped,
    ///Linear filtering inside a mip level, nearest between texels at magnification.
    PixelLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SamplerInit {
    pub label: String,
    pub sampler_type: SamplerType,
    pub address_mode: AddressMode,
}

impl SamplerInit {
    pub fn new(label: impl Into<String>, sampler_type: SamplerType) -> Self {
        SamplerInit {
            label: label.into(),
            sampler_type,
            address_mode: AddressMode::Clamp,
        }
    }
}

macro_rules! resource_handle {
    ($name:ident, $native:ident, $init:ident) => {
        pub struct $name<B: Backend> {
            shared: Arc<($init, B::$native)>,
        }

        impl<B: Backend> $name<B> {
            pub(crate) fn new(init: $init, native: B::$native) -> Self {
                $name {
                    shared: Arc::new((init, native)),
                }
            }

            pub fn init(&self) -> &$init {
                &self.shared.0
            }

            pub fn native(&self) -> &B::$native {
                &self.shared.1
            }

            /// Whether two handles refer to the same object.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.shared, &other.shared)
            }

            /// Number of handles sharing this object.
            pub fn holders(&self) -> usize {
                Arc::strong_count(&self.shared)
            }
        }

        impl<B: Backend> Clone for $name<B> {
            fn clone(&self) -> Self {
                $name {
                    shared: self.shared.clone(),
                }
            }
        }

        impl<B: Backend> Debug for $name<B> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&self.shared.0.label)
                    .finish()
            }
        }
    };
}

resource_handle!(Buffer, Buffer, BufferInit);
resource_handle!(Texture, Texture, TextureInit);
resource_handle!(Sampler, Sampler, SamplerInit);

/**
An object written into one position of a descriptor set.

The variant decides which kind of view is created.  `None` for a buffer or texture writes a
placeholder view, so the slot never holds garbage.
*/
pub enum BoundObject<B: Backend> {
    Sampler(Sampler<B>),
    UniformBuffer(Buffer<B>),
    Buffer(Option<Buffer<B>>),
    RWBuffer(Option<Buffer<B>>),
    Texture(Option<Texture<B>>),
    RWTexture(Option<Texture<B>>),
}

impl<B: Backend> BoundObject<B> {
    /// The layout entry kind this object can be written into.
    pub fn kind(&self) -> DescriptorKind {
        match self {
            BoundObject::Sampler(_) => DescriptorKind::Sampler,
            BoundObject::UniformBuffer(_) => DescriptorKind::UniformBuffer,
            BoundObject::Buffer(_) => DescriptorKind::ResourceBuffer,
            BoundObject::RWBuffer(_) => DescriptorKind::RWResourceBuffer,
            BoundObject::Texture(_) => DescriptorKind::ResourceTexture,
            BoundObject::RWTexture(_) => DescriptorKind::RWResourceTexture,
        }
    }

    /// Why the object's usage rules out the view its variant asks for, if it does.
    pub fn usage_conflict(&self) -> Option<&'static str> {
        match self {
            BoundObject::UniformBuffer(b) if b.init().usage != BufferUsage::Uniform => {
                Some("buffer was not created for uniform reads")
            }
            BoundObject::Buffer(Some(b)) if b.init().usage == BufferUsage::Uniform => {
                Some("uniform buffers can't be read as structured buffers")
            }
            BoundObject::RWBuffer(Some(b)) if b.init().usage != BufferUsage::ShaderReadWrite => {
                Some("buffer was not created for read-write access")
            }
            BoundObject::RWTexture(Some(t)) if t.init().usage != TextureUsage::Storage => {
                Some("texture was not created for storage access")
            }
            _ => None,
        }
    }
}

impl<B: Backend> Clone for BoundObject<B> {
    fn clone(&self) -> Self {
        match self {
            BoundObject::Sampler(s) => BoundObject::Sampler(s.clone()),
            BoundObject::UniformBuffer(b) => BoundObject::UniformBuffer(b.clone()),
            BoundObject::Buffer(b) => BoundObject::Buffer(b.clone()),
            BoundObject::RWBuffer(b) => BoundObject::RWBuffer(b.clone()),
            BoundObject::Texture(t) => BoundObject::Texture(t.clone()),
            BoundObject::RWTexture(t) => BoundObject::RWTexture(t.clone()),
        }
    }
}

impl<B: Backend> Debug for BoundObject<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundObject::Sampler(s) => f.debug_tuple("Sampler").field(s).finish(),
            BoundObject::UniformBuffer(b) => f.debug_tuple("UniformBuffer").field(b).finish(),
            BoundObject::Buffer(b) => f.debug_tuple("Buffer").field(b).finish(),
            BoundObject::RWBuffer(b) => f.debug_tuple("RWBuffer").field(b).finish(),
            BoundObject::Texture(t) => f.debug_tuple("Texture").field(t).finish(),
            BoundObject::RWTexture(t) => f.debug_tuple("RWTexture").field(t).finish(),
        }
    }
}

/// Borrowed form of a [`BoundObject`], handed to the backend to write one view.
#[derive(Debug)]
pub enum ViewDesc<'a, B: Backend> {
    Sampler(&'a B::Sampler),
    ConstantBuffer(&'a B::Buffer, &'a BufferInit),
    ShaderResourceBuffer(Option<(&'a B::Buffer, &'a BufferInit)>),
    UnorderedAccessBuffer(Option<(&'a B::Buffer, &'a BufferInit)>),
    ShaderResourceTexture(Option<(&'a B::Texture, &'a TextureInit)>),
    UnorderedAccessTexture(Option<(&'a B::Texture, &'a TextureInit)>),
}

impl<'a, B: Backend> ViewDesc<'a, B> {
    pub(crate) fn of(object: &'a BoundObject<B>) -> Self {
        let buffer = |b: &'a Buffer<B>| (b.native(), b.init());
        let texture = |t: &'a Texture<B>| (t.native(), t.init());
        match object {
            BoundObject::Sampler(s) => ViewDesc::Sampler(s.native()),
            BoundObject::UniformBuffer(b) => ViewDesc::ConstantBuffer(b.native(), b.init()),
            BoundObject::Buffer(b) => ViewDesc::ShaderResourceBuffer(b.as_ref().map(buffer)),
            BoundObject::RWBuffer(b) => ViewDesc::UnorderedAccessBuffer(b.as_ref().map(buffer)),
            BoundObject::Texture(t) => ViewDesc::ShaderResourceTexture(t.as_ref().map(texture)),
            BoundObject::RWTexture(t) => {
                ViewDesc::UnorderedAccessTexture(t.as_ref().map(texture))
            }
        }
    }
}
