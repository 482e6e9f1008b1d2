use alloc::vec::Vec;

use crate::fourcc::{FormatInfo, Fourcc, Modifier};

/// Maximum number of planes a single framebuffer may be split over.
pub const MAX_PLANES: usize = 4;

pub const DRM_MODE_FB_INTERLACED: u32 = 1 << 0;
pub const DRM_MODE_FB_MODIFIERS: u32 = 1 << 1;

bitflags::bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FbCmdFlags: u32 {
        const INTERLACED = DRM_MODE_FB_INTERLACED;
        /// The request's `modifier` fields are meaningful.
        const MODIFIERS = DRM_MODE_FB_MODIFIERS;
    }
}

/// A client's description of a framebuffer it would like created.
///
/// This is the raw, unchecked form. Nothing in it is trusted until
/// [`super::check_request`] has produced a [`NormalizedRequest`] from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramebufferRequest {
    pub width: u32,
    pub height: u32,
    pub pixel_format: Fourcc,
    /// Raw flag bits, which may include bits this crate doesn't recognize.
    pub flags: u32,
    pub handles: [u32; MAX_PLANES],
    pub pitches: [u32; MAX_PLANES],
    pub offsets: [u32; MAX_PLANES],
    pub modifier: [Modifier; MAX_PLANES],
}

impl FramebufferRequest {
    pub fn new(width: u32, height: u32, pixel_format: Fourcc) -> Self {
        Self {
            width,
            height,
            pixel_format,
            ..Self::default()
        }
    }

    /// Build a request the way a client that only knows about a color
    /// depth and bits per pixel would describe a single-plane buffer.
    ///
    /// Pairs that don't correspond to a known format produce a request
    /// with an unknown pixel format, which checking will then reject.
    pub fn legacy(width: u32, height: u32, bpp: u32, depth: u32, pitch: u32, handle: u32) -> Self {
        let format = crate::fourcc::legacy_format(bpp, depth).unwrap_or_default();
        Self::new(width, height, format).with_plane(0, handle, pitch, 0)
    }

    /// Set the buffer handle, pitch and offset of one plane.
    ///
    /// # Panics
    ///
    /// Panics if `plane` is not less than [`MAX_PLANES`].
    pub fn with_plane(mut self, plane: usize, handle: u32, pitch: u32, offset: u32) -> Self {
        self.handles[plane] = handle;
        self.pitches[plane] = pitch;
        self.offsets[plane] = offset;
        self
    }

    /// # Panics
    ///
    /// Panics if `plane` is not less than [`MAX_PLANES`].
    pub fn with_modifier(mut self, plane: usize, modifier: Modifier) -> Self {
        self.modifier[plane] = modifier;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    #[inline(always)]
    pub fn explicit_modifiers(&self) -> bool {
        (self.flags & DRM_MODE_FB_MODIFIERS) != 0
    }
}

/// Where in a buffer object one plane of a framebuffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbPlane {
    pub handle: u32,
    pub pitch: u32,
    pub offset: u32,
}

/// A request that passed every admission check.
///
/// Only the planes the pixel format actually uses are kept, and the
/// modifier is the single value shared by all of them.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: &'static FormatInfo,
    pub(crate) flags: FbCmdFlags,
    pub(crate) modifier: Modifier,
    pub(crate) planes: Vec<FbPlane>,
}

impl NormalizedRequest {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub fn format(&self) -> &'static FormatInfo {
        self.format
    }

    #[inline(always)]
    pub fn flags(&self) -> FbCmdFlags {
        self.flags
    }

    #[inline(always)]
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    #[inline(always)]
    pub fn planes(&self) -> &[FbPlane] {
        &self.planes
    }
}
