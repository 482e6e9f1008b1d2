/// Fixed-point unsigned 16.16-bit number type, represented as [`u32`].
///
/// Plane source rectangles are expressed in this type so that hardware
/// which can sample at sub-pixel positions can be given exact coordinates.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct fixedu16_16(u32);

impl fixedu16_16 {
    pub const ZERO: Self = Self(0);

    #[inline(always)]
    pub const fn from_raw(v: u32) -> Self {
        Self(v)
    }

    #[inline(always)]
    pub fn from_u16(v: u16) -> Self {
        Self((v as u32) << 16)
    }

    #[inline(always)]
    pub fn from_u16_frac(w: u16, f: u16) -> Self {
        Self(((w as u32) << 16) | (f as u32))
    }

    #[inline(always)]
    pub fn as_raw_u32(self) -> u32 {
        self.0
    }

    /// The value widened to 64 bits, so that sums of two coordinates
    /// can't wrap.
    #[inline(always)]
    pub(crate) fn widen(self) -> u64 {
        self.0 as u64
    }

    /// The integer part, discarding the fraction.
    #[inline(always)]
    pub fn trunc(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl From<u16> for fixedu16_16 {
    #[inline(always)]
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl From<u8> for fixedu16_16 {
    #[inline(always)]
    fn from(value: u8) -> Self {
        Self::from_u16(value as u16)
    }
}
