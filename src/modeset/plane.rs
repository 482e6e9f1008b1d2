use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::result::Error;
use crate::Device;

use super::{CrtcId, Framebuffer, FramebufferId, PlaneId};

/// Driver hooks for a plane.
pub trait PlaneFuncs: Send + Sync {
    /// Stop the plane scanning out anything.
    fn disable_plane(&self, dev: &Device, plane: &Plane) -> Result<(), Error>;
}

/// Driver hooks for a CRTC.
pub trait CrtcFuncs: Send + Sync {
    /// Apply a legacy mode configuration to the CRTC.
    fn set_config(&self, dev: &Device, set: &ModeSet) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    Overlay,
    Primary,
    Cursor,
}

/// A legacy mode configuration for one CRTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSet {
    pub crtc_id: CrtcId,
    pub fb_id: Option<FramebufferId>,
}

impl ModeSet {
    /// A configuration that turns the CRTC off.
    pub fn disable(crtc_id: CrtcId) -> Self {
        Self {
            crtc_id,
            fb_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneState {
    pub id: PlaneId,
    pub plane_type: PlaneType,
    pub crtc_id: Option<CrtcId>,
    pub fb_id: Option<FramebufferId>,
    pub old_fb_id: Option<FramebufferId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcState {
    pub crtc_id: CrtcId,
    /// Framebuffer currently on the CRTC's primary plane.
    pub fb_id: Option<FramebufferId>,
    pub active: bool,
}

#[derive(Default)]
struct PlaneBinding {
    fb: Option<Arc<Framebuffer>>,
    old_fb: Option<Arc<Framebuffer>>,
    crtc: Option<CrtcId>,
}

/// A scanout source that can show one framebuffer at a time.
///
/// Each framebuffer a plane points at holds one reference on it.
pub struct Plane {
    id: PlaneId,
    plane_type: PlaneType,
    funcs: Arc<dyn PlaneFuncs>,
    modeset: spin::Mutex<()>,
    binding: spin::Mutex<PlaneBinding>,
}

impl Plane {
    pub(crate) fn new(id: PlaneId, plane_type: PlaneType, funcs: Arc<dyn PlaneFuncs>) -> Self {
        Self {
            id,
            plane_type,
            funcs,
            modeset: spin::Mutex::new(()),
            binding: spin::Mutex::new(PlaneBinding::default()),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> PlaneId {
        self.id
    }

    #[inline(always)]
    pub fn plane_type(&self) -> PlaneType {
        self.plane_type
    }

    pub fn funcs(&self) -> &Arc<dyn PlaneFuncs> {
        &self.funcs
    }

    /// The framebuffer currently shown. No reference is taken.
    pub fn fb(&self) -> Option<Arc<Framebuffer>> {
        self.binding.lock().fb.clone()
    }

    pub fn crtc(&self) -> Option<CrtcId> {
        self.binding.lock().crtc
    }

    pub fn shows(&self, fb: &Framebuffer) -> bool {
        self.binding
            .lock()
            .fb
            .as_ref()
            .is_some_and(|cur| core::ptr::eq(Arc::as_ptr(cur), fb))
    }

    pub fn state(&self) -> PlaneState {
        let binding = self.binding.lock();
        PlaneState {
            id: self.id,
            plane_type: self.plane_type,
            crtc_id: binding.crtc,
            fb_id: binding.fb.as_ref().and_then(|fb| fb.id()),
            old_fb_id: binding.old_fb.as_ref().and_then(|fb| fb.id()),
        }
    }

    pub(crate) fn lock_modeset(&self) -> spin::MutexGuard<'_, ()> {
        self.modeset.lock()
    }

    /// Point the plane at `fb`, whose reference the plane takes over.
    ///
    /// The previous framebuffer is parked as `old_fb` until
    /// [`Self::finish_update`] hands it back for releasing.
    pub(crate) fn begin_update(&self, fb: Option<Arc<Framebuffer>>, crtc: Option<CrtcId>) {
        let mut binding = self.binding.lock();
        binding.old_fb = core::mem::replace(&mut binding.fb, fb);
        binding.crtc = crtc;
    }

    pub(crate) fn finish_update(&self) -> Option<Arc<Framebuffer>> {
        self.binding.lock().old_fb.take()
    }

    /// Detach everything from the plane if it still shows `fb`, returning
    /// the reference the caller now owns.
    pub(crate) fn clear_if_shows(&self, fb: &Framebuffer) -> Option<Arc<Framebuffer>> {
        let mut binding = self.binding.lock();
        let cur = binding.fb.as_ref()?;
        if !core::ptr::eq(Arc::as_ptr(cur), fb) {
            return None;
        }
        binding.crtc = None;
        binding.fb.take()
    }
}

impl fmt::Debug for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plane")
            .field("id", &self.id)
            .field("plane_type", &self.plane_type)
            .finish_non_exhaustive()
    }
}

/// A display pipe, fed by its primary plane.
pub struct Crtc {
    id: CrtcId,
    primary: Arc<Plane>,
    funcs: Arc<dyn CrtcFuncs>,
    modeset: spin::Mutex<()>,
    active: AtomicBool,
}

impl Crtc {
    pub(crate) fn new(id: CrtcId, primary: Arc<Plane>, funcs: Arc<dyn CrtcFuncs>) -> Self {
        Self {
            id,
            primary,
            funcs,
            modeset: spin::Mutex::new(()),
            active: AtomicBool::new(false),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> CrtcId {
        self.id
    }

    #[inline(always)]
    pub fn primary(&self) -> &Arc<Plane> {
        &self.primary
    }

    pub fn funcs(&self) -> &Arc<dyn CrtcFuncs> {
        &self.funcs
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn state(&self) -> CrtcState {
        CrtcState {
            crtc_id: self.id,
            fb_id: self.primary.fb().and_then(|fb| fb.id()),
            active: self.is_active(),
        }
    }

    pub(crate) fn lock_modeset(&self) -> spin::MutexGuard<'_, ()> {
        self.modeset.lock()
    }
}

impl fmt::Debug for Crtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crtc")
            .field("id", &self.id)
            .field("primary", &self.primary.id())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
