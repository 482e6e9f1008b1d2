//! Pixel formats, layout modifiers, and the static table describing how
//! each supported format is laid out in memory.

use core::fmt;

const fn fourcc_code(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

const fn fourcc_mod_code(vendor: u8, val: u64) -> u64 {
    ((vendor as u64) << 56) | (val & 0x00ff_ffff_ffff_ffff)
}

/// A pixel format, identified by its little-endian four character code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Fourcc(pub u32);

impl Fourcc {
    pub const C8: Self = Self(fourcc_code(b'C', b'8', b' ', b' '));
    pub const RGB565: Self = Self(fourcc_code(b'R', b'G', b'1', b'6'));
    pub const BGR565: Self = Self(fourcc_code(b'B', b'G', b'1', b'6'));
    pub const XRGB1555: Self = Self(fourcc_code(b'X', b'R', b'1', b'5'));
    pub const ARGB1555: Self = Self(fourcc_code(b'A', b'R', b'1', b'5'));
    pub const RGB888: Self = Self(fourcc_code(b'R', b'G', b'2', b'4'));
    pub const BGR888: Self = Self(fourcc_code(b'B', b'G', b'2', b'4'));
    pub const XRGB8888: Self = Self(fourcc_code(b'X', b'R', b'2', b'4'));
    pub const ARGB8888: Self = Self(fourcc_code(b'A', b'R', b'2', b'4'));
    pub const XBGR8888: Self = Self(fourcc_code(b'X', b'B', b'2', b'4'));
    pub const ABGR8888: Self = Self(fourcc_code(b'A', b'B', b'2', b'4'));
    pub const RGBA8888: Self = Self(fourcc_code(b'R', b'A', b'2', b'4'));
    pub const XRGB2101010: Self = Self(fourcc_code(b'X', b'R', b'3', b'0'));
    pub const ARGB2101010: Self = Self(fourcc_code(b'A', b'R', b'3', b'0'));
    pub const YUYV: Self = Self(fourcc_code(b'Y', b'U', b'Y', b'V'));
    pub const UYVY: Self = Self(fourcc_code(b'U', b'Y', b'V', b'Y'));
    pub const NV12: Self = Self(fourcc_code(b'N', b'V', b'1', b'2'));
    pub const NV21: Self = Self(fourcc_code(b'N', b'V', b'2', b'1'));
    pub const NV16: Self = Self(fourcc_code(b'N', b'V', b'1', b'6'));
    pub const P010: Self = Self(fourcc_code(b'P', b'0', b'1', b'0'));
    pub const YUV420: Self = Self(fourcc_code(b'Y', b'U', b'1', b'2'));
    pub const YVU420: Self = Self(fourcc_code(b'Y', b'V', b'1', b'2'));
    pub const YUV422: Self = Self(fourcc_code(b'Y', b'U', b'1', b'6'));
    pub const YUV444: Self = Self(fourcc_code(b'Y', b'U', b'2', b'4'));
    /// Packed 2x2 blocks of 10-bit luma and chroma.
    pub const X0L2: Self = Self(fourcc_code(b'X', b'0', b'L', b'2'));
    /// Compressed-only 8-bit 4:2:0, which has no linear representation.
    pub const YUV420_8BIT: Self = Self(fourcc_code(b'Y', b'U', b'0', b'8'));
    /// Compressed-only 10-bit 4:2:0, which has no linear representation.
    pub const YUV420_10BIT: Self = Self(fourcc_code(b'Y', b'U', b'1', b'0'));
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            let s = core::str::from_utf8(&bytes).map_err(|_| fmt::Error)?;
            write!(f, "Fourcc({:?})", s)
        } else {
            write!(f, "Fourcc({:#010x})", self.0)
        }
    }
}

pub const MODIFIER_VENDOR_NONE: u8 = 0;
pub const MODIFIER_VENDOR_INTEL: u8 = 0x01;
pub const MODIFIER_VENDOR_AMD: u8 = 0x02;
pub const MODIFIER_VENDOR_NVIDIA: u8 = 0x03;
pub const MODIFIER_VENDOR_SAMSUNG: u8 = 0x04;
pub const MODIFIER_VENDOR_QCOM: u8 = 0x05;
pub const MODIFIER_VENDOR_ARM: u8 = 0x08;

const ARM_TYPE_AFBC: u64 = 0x00;

pub const AFBC_FORMAT_MOD_BLOCK_SIZE_16X16: u64 = 1;
pub const AFBC_FORMAT_MOD_BLOCK_SIZE_32X8: u64 = 2;
pub const AFBC_FORMAT_MOD_YTR: u64 = 1 << 4;
pub const AFBC_FORMAT_MOD_SPLIT: u64 = 1 << 5;
pub const AFBC_FORMAT_MOD_SPARSE: u64 = 1 << 6;

/// An opaque buffer layout identifier, such as a tiling or compression
/// scheme. The top eight bits name the vendor that defined it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Modifier(pub u64);

impl Modifier {
    pub const LINEAR: Self = Self(0);
    pub const INVALID: Self = Self(fourcc_mod_code(MODIFIER_VENDOR_NONE, 0x00ff_ffff_ffff_ffff));
    /// Samsung's 64x32 macroblock tiling, only defined for NV12.
    pub const SAMSUNG_64_32_TILE: Self = Self(fourcc_mod_code(MODIFIER_VENDOR_SAMSUNG, 1));

    /// An Arm Framebuffer Compression layout with the given `AFBC_FORMAT_MOD_*`
    /// mode bits.
    #[inline]
    pub const fn arm_afbc(mode: u64) -> Self {
        Self(fourcc_mod_code(
            MODIFIER_VENDOR_ARM,
            (ARM_TYPE_AFBC << 52) | (mode & 0x000f_ffff_ffff_ffff),
        ))
    }

    #[inline(always)]
    pub const fn vendor(self) -> u8 {
        (self.0 >> 56) as u8
    }

    #[inline(always)]
    pub const fn is_linear(self) -> bool {
        self.0 == Self::LINEAR.0
    }

    fn is_arm_afbc(self) -> bool {
        self.vendor() == MODIFIER_VENDOR_ARM && ((self.0 >> 52) & 0xf) == ARM_TYPE_AFBC
    }

    /// Alignment the layout imposes on the framebuffer geometry, if any.
    pub fn tile_alignment(self) -> Option<TileAlignment> {
        match self {
            Self::SAMSUNG_64_32_TILE => Some(TileAlignment {
                width: 128,
                height: 32,
                pitch: 128,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileAlignment {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
}

/// One entry in a format's set of admissible modifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifierRule {
    Linear,
    Exact(Modifier),
    /// Any Arm Framebuffer Compression modifier, whatever its mode bits.
    ArmAfbc,
}

impl ModifierRule {
    #[inline]
    pub fn admits(self, modifier: Modifier) -> bool {
        match self {
            ModifierRule::Linear => modifier.is_linear(),
            ModifierRule::Exact(m) => m == modifier,
            ModifierRule::ArmAfbc => modifier.is_arm_afbc(),
        }
    }
}

/// Memory layout of one pixel format.
///
/// Formats may be split over up to four planes. Plane 0 always covers the
/// full image; the remaining planes are subsampled by `hsub` and `vsub`.
/// Each plane is made of blocks of `block_w` by `block_h` pixels occupying
/// `char_per_block` bytes. A zero `char_per_block` marks a layout that is
/// only defined under a non-linear modifier.
#[derive(Debug)]
pub struct FormatInfo {
    pub format: Fourcc,
    pub num_planes: u8,
    pub char_per_block: [u8; 4],
    pub block_w: [u8; 4],
    pub block_h: [u8; 4],
    pub hsub: u8,
    pub vsub: u8,
    pub is_yuv: bool,
    /// Modifiers the format may be combined with. Empty means linear only.
    pub modifiers: &'static [ModifierRule],
}

impl FormatInfo {
    #[inline]
    pub fn plane_count(&self) -> usize {
        self.num_planes as usize
    }

    #[inline]
    pub fn block_width(&self, plane: usize) -> u32 {
        match self.block_w.get(plane) {
            Some(&w) if w != 0 => w as u32,
            _ => 1,
        }
    }

    #[inline]
    pub fn block_height(&self, plane: usize) -> u32 {
        match self.block_h.get(plane) {
            Some(&h) if h != 0 => h as u32,
            _ => 1,
        }
    }

    #[inline]
    pub fn block_bytes(&self, plane: usize) -> u32 {
        self.char_per_block.get(plane).copied().unwrap_or(0) as u32
    }

    pub fn plane_width(&self, width: u32, plane: usize) -> u32 {
        if plane == 0 {
            return width;
        }
        width.div_ceil(self.hsub.max(1) as u32)
    }

    pub fn plane_height(&self, height: u32, plane: usize) -> u32 {
        if plane == 0 {
            return height;
        }
        height.div_ceil(self.vsub.max(1) as u32)
    }

    /// Smallest row stride that holds a line of `width` pixels of the
    /// image in the given plane.
    ///
    /// Returns zero for opaque layouts, which have no meaningful stride.
    pub fn min_pitch(&self, plane: usize, width: u32) -> u64 {
        let plane_width = self.plane_width(width, plane) as u64;
        let block_pixels = (self.block_width(plane) * self.block_height(plane)) as u64;
        (plane_width * self.block_bytes(plane) as u64).div_ceil(block_pixels)
    }

    pub fn admits_modifier(&self, modifier: Modifier) -> bool {
        if self.modifiers.is_empty() {
            return modifier.is_linear();
        }
        self.modifiers.iter().any(|rule| rule.admits(modifier))
    }
}

const LINEAR_ONLY: &[ModifierRule] = &[];
const LINEAR_OR_AFBC: &[ModifierRule] = &[ModifierRule::Linear, ModifierRule::ArmAfbc];
const AFBC_ONLY: &[ModifierRule] = &[ModifierRule::ArmAfbc];
const NV12_MODIFIERS: &[ModifierRule] = &[
    ModifierRule::Linear,
    ModifierRule::Exact(Modifier::SAMSUNG_64_32_TILE),
];

const fn packed(format: Fourcc, cpp: u8, modifiers: &'static [ModifierRule]) -> FormatInfo {
    FormatInfo {
        format,
        num_planes: 1,
        char_per_block: [cpp, 0, 0, 0],
        block_w: [1, 0, 0, 0],
        block_h: [1, 0, 0, 0],
        hsub: 1,
        vsub: 1,
        is_yuv: false,
        modifiers,
    }
}

const fn yuv(
    format: Fourcc,
    planes: u8,
    cpp: [u8; 4],
    hsub: u8,
    vsub: u8,
    modifiers: &'static [ModifierRule],
) -> FormatInfo {
    FormatInfo {
        format,
        num_planes: planes,
        char_per_block: cpp,
        block_w: [1, 1, 1, 0],
        block_h: [1, 1, 1, 0],
        hsub,
        vsub,
        is_yuv: true,
        modifiers,
    }
}

static FORMATS: &[FormatInfo] = &[
    packed(Fourcc::C8, 1, LINEAR_ONLY),
    packed(Fourcc::RGB565, 2, LINEAR_OR_AFBC),
    packed(Fourcc::BGR565, 2, LINEAR_OR_AFBC),
    packed(Fourcc::XRGB1555, 2, LINEAR_ONLY),
    packed(Fourcc::ARGB1555, 2, LINEAR_ONLY),
    packed(Fourcc::RGB888, 3, LINEAR_OR_AFBC),
    packed(Fourcc::BGR888, 3, LINEAR_OR_AFBC),
    packed(Fourcc::XRGB8888, 4, LINEAR_OR_AFBC),
    packed(Fourcc::ARGB8888, 4, LINEAR_OR_AFBC),
    packed(Fourcc::XBGR8888, 4, LINEAR_OR_AFBC),
    packed(Fourcc::ABGR8888, 4, LINEAR_OR_AFBC),
    packed(Fourcc::RGBA8888, 4, LINEAR_OR_AFBC),
    packed(Fourcc::XRGB2101010, 4, LINEAR_OR_AFBC),
    packed(Fourcc::ARGB2101010, 4, LINEAR_OR_AFBC),
    yuv(Fourcc::YUYV, 1, [2, 0, 0, 0], 2, 1, LINEAR_ONLY),
    yuv(Fourcc::UYVY, 1, [2, 0, 0, 0], 2, 1, LINEAR_ONLY),
    yuv(Fourcc::NV12, 2, [1, 2, 0, 0], 2, 2, NV12_MODIFIERS),
    yuv(Fourcc::NV21, 2, [1, 2, 0, 0], 2, 2, LINEAR_ONLY),
    yuv(Fourcc::NV16, 2, [1, 2, 0, 0], 2, 1, LINEAR_ONLY),
    yuv(Fourcc::P010, 2, [2, 4, 0, 0], 2, 2, LINEAR_ONLY),
    yuv(Fourcc::YUV420, 3, [1, 1, 1, 0], 2, 2, LINEAR_OR_AFBC),
    yuv(Fourcc::YVU420, 3, [1, 1, 1, 0], 2, 2, LINEAR_OR_AFBC),
    yuv(Fourcc::YUV422, 3, [1, 1, 1, 0], 2, 1, LINEAR_ONLY),
    yuv(Fourcc::YUV444, 3, [1, 1, 1, 0], 1, 1, LINEAR_ONLY),
    FormatInfo {
        format: Fourcc::X0L2,
        num_planes: 1,
        char_per_block: [8, 0, 0, 0],
        block_w: [2, 0, 0, 0],
        block_h: [2, 0, 0, 0],
        hsub: 2,
        vsub: 2,
        is_yuv: true,
        modifiers: LINEAR_OR_AFBC,
    },
    yuv(Fourcc::YUV420_8BIT, 1, [0, 0, 0, 0], 2, 2, AFBC_ONLY),
    yuv(Fourcc::YUV420_10BIT, 1, [0, 0, 0, 0], 2, 2, AFBC_ONLY),
];

/// Look up the layout description of a pixel format.
pub fn format_info(format: Fourcc) -> Option<&'static FormatInfo> {
    FORMATS.iter().find(|info| info.format == format)
}

/// Map a legacy bits-per-pixel and color depth pair onto a pixel format.
pub fn legacy_format(bpp: u32, depth: u32) -> Option<Fourcc> {
    let fmt = match (bpp, depth) {
        (8, 8) => Fourcc::C8,
        (16, 15) => Fourcc::XRGB1555,
        (16, 16) => Fourcc::RGB565,
        (24, 24) => Fourcc::RGB888,
        (32, 24) => Fourcc::XRGB8888,
        (32, 30) => Fourcc::XRGB2101010,
        (32, 32) => Fourcc::ARGB8888,
        _ => return None,
    };
    Some(fmt)
}
