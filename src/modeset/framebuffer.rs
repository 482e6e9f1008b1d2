use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};

use crate::fixed::fixedu16_16;
use crate::fourcc::{FormatInfo, Modifier};
use crate::result::Error;
use crate::{Device, DeviceToken, DrmFile};

use super::request::{FbCmdFlags, FbPlane, NormalizedRequest};
use super::FramebufferId;

/// Driver hooks attached to a framebuffer when it is registered.
pub trait FramebufferFuncs: Send + Sync {
    /// Release whatever the driver allocated for `fb`.
    ///
    /// Called exactly once, when the last reference is dropped. By then the
    /// framebuffer has already been removed from the device's registry, so
    /// it can no longer be looked up.
    fn destroy(&self, dev: &Device, fb: &Framebuffer);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FramebufferState {
    /// Constructed but not yet visible to lookups.
    Unregistered = 0,
    Registered = 1,
    /// The last reference was dropped and teardown is in progress.
    Destroying = 2,
    Gone = 3,
}

impl From<u8> for FramebufferState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unregistered,
            1 => Self::Registered,
            2 => Self::Destroying,
            _ => Self::Gone,
        }
    }
}

/// A validated description of a buffer's layout that planes can scan out.
///
/// The pixel storage itself belongs to the driver; this only records where
/// each plane lives and how it's laid out. Lifetime is governed by an
/// explicit reference count (see [`Framebuffer::get`] and
/// [`Framebuffer::put`]) rather than by the [`Arc`] holding it, because
/// teardown needs the device to unregister from and the driver to call.
pub struct Framebuffer {
    id: AtomicU32,
    dev: DeviceToken,
    format: Option<&'static FormatInfo>,
    width: u32,
    height: u32,
    modifier: Modifier,
    flags: FbCmdFlags,
    planes: Vec<FbPlane>,
    comm: String,
    refcount: AtomicU32,
    state: AtomicU8,
    funcs: Option<Arc<dyn FramebufferFuncs>>,
}

impl Framebuffer {
    /// Describe a framebuffer for a checked request, on behalf of `file`.
    ///
    /// The result is private to its creator until passed to
    /// [`Device::framebuffer_init`].
    pub fn new(dev: &Device, file: &DrmFile, req: &NormalizedRequest) -> Self {
        Self {
            format: Some(req.format()),
            width: req.width(),
            height: req.height(),
            modifier: req.modifier(),
            flags: req.flags(),
            planes: req.planes().to_vec(),
            comm: String::from(file.comm()),
            ..Self::zeroed(dev)
        }
    }

    /// An empty framebuffer with no format, belonging to `dev`.
    pub fn zeroed(dev: &Device) -> Self {
        Self {
            id: AtomicU32::new(0),
            dev: dev.token(),
            format: None,
            width: 0,
            height: 0,
            modifier: Modifier::LINEAR,
            flags: FbCmdFlags::empty(),
            planes: Vec::new(),
            comm: String::new(),
            refcount: AtomicU32::new(1),
            state: AtomicU8::new(FramebufferState::Unregistered as u8),
            funcs: None,
        }
    }

    pub fn with_format(mut self, format: &'static FormatInfo) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// The registry id, or `None` while the framebuffer isn't registered.
    #[inline]
    pub fn id(&self) -> Option<FramebufferId> {
        match self.id.load(Ordering::Acquire) {
            0 => None,
            id => Some(FramebufferId(id)),
        }
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub fn format(&self) -> Option<&'static FormatInfo> {
        self.format
    }

    #[inline(always)]
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    #[inline(always)]
    pub fn flags(&self) -> FbCmdFlags {
        self.flags
    }

    #[inline(always)]
    pub fn planes(&self) -> &[FbPlane] {
        &self.planes
    }

    /// Name of the process that created the framebuffer, for diagnostics.
    #[inline(always)]
    pub fn comm(&self) -> &str {
        &self.comm
    }

    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    #[inline]
    pub fn state(&self) -> FramebufferState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn funcs(&self) -> Option<&Arc<dyn FramebufferFuncs>> {
        self.funcs.as_ref()
    }

    #[inline(always)]
    pub fn belongs_to(&self, dev: &Device) -> bool {
        self.dev == dev.token()
    }

    /// Take an additional reference.
    ///
    /// The caller must already hold one; reviving a framebuffer whose count
    /// reached zero is a contract violation and panics.
    pub fn get(&self) {
        let prev = self.refcount.fetch_add(1, Ordering::Relaxed);
        if prev == 0 {
            panic!("reference taken on a released framebuffer");
        }
    }

    /// Take a reference only if the framebuffer isn't already being torn down.
    pub(crate) fn get_unless_zero(&self) -> bool {
        self.refcount
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |c| {
                if c == 0 {
                    None
                } else {
                    Some(c + 1)
                }
            })
            .is_ok()
    }

    /// Drop a reference, destroying the framebuffer if it was the last one.
    ///
    /// Only the caller that moves the count from one to zero tears down,
    /// so racing callers can't destroy twice. Dropping more references than
    /// were taken, or passing a device other than the one the framebuffer
    /// was created for, panics.
    pub fn put(&self, dev: &Device) {
        assert!(
            self.belongs_to(dev),
            "framebuffer released on a device it doesn't belong to"
        );
        let prev = self
            .refcount
            .fetch_update(Ordering::Release, Ordering::Relaxed, |c| c.checked_sub(1))
            .unwrap_or_else(|_| panic!("framebuffer refcount underflow"));
        if prev == 1 {
            fence(Ordering::Acquire);
            self.free(dev);
        }
    }

    fn free(&self, dev: &Device) {
        self.state
            .store(FramebufferState::Destroying as u8, Ordering::Release);

        {
            let mut registry = dev.mode_config();
            if let Some(id) = self.id() {
                registry.unregister_framebuffer(self);
                self.id.store(0, Ordering::Release);
                log::trace!("framebuffer {} unregistered", id.0);
            }
        }

        if let Some(funcs) = &self.funcs {
            funcs.destroy(dev, self);
        }
        self.state.store(FramebufferState::Gone as u8, Ordering::Release);
    }

    /// Check that a 16.16 fixed-point source rectangle lies within the
    /// framebuffer.
    pub fn check_src_coords(
        &self,
        src_x: fixedu16_16,
        src_y: fixedu16_16,
        src_w: fixedu16_16,
        src_h: fixedu16_16,
    ) -> Result<(), Error> {
        let fb_width = (self.width as u64) << 16;
        let fb_height = (self.height as u64) << 16;

        if src_x.widen() + src_w.widen() > fb_width || src_y.widen() + src_h.widen() > fb_height {
            log::debug!(
                "invalid source coordinates {:#x}x{:#x}+{:#x}+{:#x} (fb {}x{})",
                src_w.as_raw_u32(),
                src_h.as_raw_u32(),
                src_x.as_raw_u32(),
                src_y.as_raw_u32(),
                self.width,
                self.height,
            );
            return Err(Error::OutOfSpace);
        }
        Ok(())
    }

    // Only called from framebuffer_init, before the framebuffer is shared.
    pub(crate) fn prepare_registration(&mut self, id: u32, funcs: Arc<dyn FramebufferFuncs>) {
        *self.id.get_mut() = id;
        *self.state.get_mut() = FramebufferState::Registered as u8;
        self.funcs = Some(funcs);
    }
}

#[cfg(test)]
impl Framebuffer {
    pub(crate) fn refcount_for_test(&self) -> &AtomicU32 {
        &self.refcount
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("id", &self.id())
            .field("format", &self.format.map(|info| info.format))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("modifier", &self.modifier)
            .field("planes", &self.planes)
            .field("comm", &self.comm)
            .field("refcount", &self.refcount())
            .field("state", &self.state())
            .finish()
    }
}
