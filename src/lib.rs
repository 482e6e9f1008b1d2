#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Device limits and driver capabilities.
pub mod config;
pub mod fixed;
/// Pixel formats, format modifiers, and the per-format layout table.
pub mod fourcc;
/// Framebuffers and the other mode objects they get attached to.
pub mod modeset;
pub mod result;

mod file;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DeviceConfig, DriverFeatures};
pub use file::DrmFile;
pub use modeset::{
    Crtc, CrtcFuncs, Framebuffer, FramebufferFuncs, FramebufferId, FramebufferRequest,
    NormalizedRequest, ObjectRef, ObjectType, Plane, PlaneFuncs, PlaneType,
};
pub use result::{CheckError, Error};

use modeset::{AtomicCommitFlags, AtomicRequest, CrtcId, DeviceResources, ObjectRegistry, PlaneId};

/// Mode-config hooks a driver provides for a whole device.
pub trait ModeConfigFuncs: Send + Sync {
    /// Create a framebuffer for a request that has already passed
    /// [`modeset::check_request`].
    ///
    /// The implementation must register the framebuffer with
    /// [`Device::framebuffer_init`] on `dev` before returning it. A
    /// framebuffer registered on another device is refused, and the
    /// reference returned with it is leaked, because the device it would
    /// have to be dropped on isn't known here.
    fn fb_create(
        &self,
        dev: &Device,
        file: &DrmFile,
        req: &NormalizedRequest,
    ) -> Result<Arc<Framebuffer>, Error>;

    /// Apply an atomic request. Only called on devices with
    /// [`DriverFeatures::ATOMIC`].
    fn atomic_commit(
        &self,
        dev: &Device,
        req: &AtomicRequest,
        flags: AtomicCommitFlags,
    ) -> Result<(), Error> {
        let _ = (dev, req, flags);
        Err(Error::NotSupported)
    }
}

static NEXT_DEVICE: AtomicU32 = AtomicU32::new(1);

/// Identifies which device an object was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeviceToken(u32);

/// A modesetting device: its limits, its driver, and the mode objects
/// it currently knows about.
pub struct Device {
    token: DeviceToken,
    config: DeviceConfig,
    funcs: Arc<dyn ModeConfigFuncs>,
    mode_config: spin::Mutex<ObjectRegistry>,
}

impl Device {
    pub fn new(config: DeviceConfig, funcs: Arc<dyn ModeConfigFuncs>) -> Self {
        let token = DeviceToken(NEXT_DEVICE.fetch_add(1, Ordering::Relaxed));
        log::debug!(
            "new device {}: {}x{}..{}x{}, features {:?}",
            token.0,
            config.min_width,
            config.min_height,
            config.max_width,
            config.max_height,
            config.features,
        );
        Self {
            token,
            config,
            funcs,
            mode_config: spin::Mutex::new(ObjectRegistry::new()),
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[inline(always)]
    pub fn funcs(&self) -> &Arc<dyn ModeConfigFuncs> {
        &self.funcs
    }

    #[inline(always)]
    pub(crate) fn token(&self) -> DeviceToken {
        self.token
    }

    pub(crate) fn mode_config(&self) -> spin::MutexGuard<'_, ObjectRegistry> {
        self.mode_config.lock()
    }

    /// Snapshot of the planes and CRTCs, so the lock isn't held across
    /// driver callbacks.
    pub(crate) fn mode_objects(&self) -> (Vec<Arc<Plane>>, Vec<Arc<Crtc>>) {
        let registry = self.mode_config();
        (registry.planes().to_vec(), registry.crtcs().to_vec())
    }

    pub fn add_plane(
        &self,
        plane_type: PlaneType,
        funcs: Arc<dyn PlaneFuncs>,
    ) -> Result<Arc<Plane>, Error> {
        let mut registry = self.mode_config();
        let id = registry.allocate_id()?;
        if let Err(e) = registry.reserve_plane() {
            registry.remove(id);
            return Err(e);
        }
        let plane = Arc::new(Plane::new(PlaneId(id), plane_type, funcs));
        registry.add_plane(id, Arc::clone(&plane));
        Ok(plane)
    }

    /// Add a CRTC fed by `primary`, which must be a primary plane of this
    /// device.
    pub fn add_crtc(
        &self,
        primary: &Arc<Plane>,
        funcs: Arc<dyn CrtcFuncs>,
    ) -> Result<Arc<Crtc>, Error> {
        if primary.plane_type() != PlaneType::Primary {
            return Err(Error::InvalidArgument);
        }
        let mut registry = self.mode_config();
        if !registry.planes().iter().any(|p| Arc::ptr_eq(p, primary)) {
            return Err(Error::InvalidArgument);
        }
        let id = registry.allocate_id()?;
        if let Err(e) = registry.reserve_crtc() {
            registry.remove(id);
            return Err(e);
        }
        let crtc = Arc::new(Crtc::new(CrtcId(id), Arc::clone(primary), funcs));
        registry.add_crtc(id, Arc::clone(&crtc));
        Ok(crtc)
    }

    /// Register a framebuffer a driver has built, making it visible to
    /// lookups with a reference count of one.
    ///
    /// On failure the framebuffer is handed back untouched.
    pub fn framebuffer_init(
        &self,
        mut fb: Framebuffer,
        funcs: Arc<dyn FramebufferFuncs>,
    ) -> Result<Arc<Framebuffer>, (Error, Framebuffer)> {
        if !fb.belongs_to(self) || fb.format().is_none() {
            return Err((Error::InvalidArgument, fb));
        }

        let mut registry = self.mode_config();
        let id = match registry.allocate_id() {
            Ok(id) => id,
            Err(e) => return Err((e, fb)),
        };
        if let Err(e) = registry.reserve_framebuffer() {
            registry.remove(id);
            return Err((e, fb));
        }

        fb.prepare_registration(id, funcs);
        let fb = Arc::new(fb);
        registry.add_framebuffer(id, &fb);
        log::trace!("framebuffer {} registered for {}", id, fb.comm());
        Ok(fb)
    }

    /// Check a client's request and have the driver create the framebuffer,
    /// which the client then owns.
    pub fn create_framebuffer(
        &self,
        file: &DrmFile,
        req: &FramebufferRequest,
    ) -> Result<FramebufferId, Error> {
        if !self.config.has_feature(DriverFeatures::MODESET) {
            return Err(Error::NotSupported);
        }

        let req = modeset::check_request(req, &self.config)?;
        let fb = self.funcs.fb_create(self, file, &req)?;

        let Some(id) = fb.id() else {
            log::warn!("driver returned an unregistered framebuffer");
            fb.put(self);
            return Err(Error::InvalidArgument);
        };
        if !fb.belongs_to(self) {
            log::error!(
                "driver returned framebuffer {} from another device, leaking its reference",
                id.0
            );
            return Err(Error::InvalidArgument);
        }

        if let Err((e, fb)) = file.add_framebuffer(fb) {
            fb.put(self);
            return Err(e);
        }
        log::debug!("{} created framebuffer {}", file.comm(), id.0);
        Ok(id)
    }

    /// Find a framebuffer by id, taking a reference on it that the caller
    /// must drop with [`Framebuffer::put`].
    pub fn lookup_framebuffer(&self, id: FramebufferId) -> Option<Arc<Framebuffer>> {
        self.mode_config().lookup_framebuffer(id)
    }

    /// Find any mode object by id, optionally restricted to one type.
    pub fn lookup_object(&self, id: u32, ty: Option<ObjectType>) -> Option<ObjectRef> {
        self.mode_config().lookup(id, ty)
    }

    /// Remove a framebuffer on behalf of the client that created it.
    ///
    /// Planes still showing it are turned off first.
    pub fn remove_framebuffer(&self, file: &DrmFile, id: FramebufferId) -> Result<(), Error> {
        let fb = self.lookup_framebuffer(id).ok_or(Error::NotFound)?;
        let owned = file.take_framebuffer(&fb);
        fb.put(self);
        let owned = owned.ok_or(Error::NotFound)?;
        modeset::remove_framebuffer(self, owned);
        Ok(())
    }

    /// Tear down everything a departing client still owns on this device.
    ///
    /// Framebuffers the client created on other devices are left for those
    /// devices to release.
    /// Framebuffers are processed in the order they were created. Each is
    /// detached from any plane or CRTC showing it before the client's
    /// reference is dropped.
    pub fn release_client(&self, file: &DrmFile) {
        modeset::release_client(self, file);
    }

    /// The CRTC that `plane` is the primary plane of, if any.
    fn crtc_fed_by(&self, plane: &Plane) -> Option<Arc<Crtc>> {
        if plane.plane_type() != PlaneType::Primary {
            return None;
        }
        self.mode_config()
            .crtcs()
            .iter()
            .find(|crtc| core::ptr::eq(Arc::as_ptr(crtc.primary()), plane))
            .cloned()
    }

    /// Record that `plane` now shows `fb` on `crtc`.
    ///
    /// This is bookkeeping only and doesn't program the hardware. The
    /// plane takes a reference on the new framebuffer and drops the one it
    /// held on the previous one. A CRTC is active exactly while its
    /// primary plane shows something.
    pub fn update_plane(
        &self,
        plane: &Plane,
        crtc: Option<&Crtc>,
        fb: Option<&Arc<Framebuffer>>,
    ) -> Result<(), Error> {
        if fb.is_some_and(|fb| !fb.belongs_to(self) || fb.id().is_none()) {
            return Err(Error::InvalidArgument);
        }
        let fed = self.crtc_fed_by(plane);

        let old = {
            let _plane_lock = plane.lock_modeset();
            let _crtc_lock = fed.as_ref().map(|crtc| crtc.lock_modeset());
            if let Some(fb) = fb {
                fb.get();
            }
            plane.begin_update(fb.cloned(), crtc.map(|c| c.id()));
            if let Some(fed) = &fed {
                fed.set_active(fb.is_some());
            }
            plane.finish_update()
        };
        if let Some(old) = old {
            old.put(self);
        }
        Ok(())
    }

    /// Number of framebuffers currently registered.
    pub fn framebuffer_count(&self) -> u32 {
        self.mode_config().num_fb()
    }

    pub fn resources(&self) -> DeviceResources {
        let registry = self.mode_config();
        DeviceResources {
            fb_ids: registry.fb_ids().collect(),
            crtc_ids: registry.crtc_ids().collect(),
            plane_ids: registry.plane_ids().collect(),
            min_width: self.config.min_width,
            max_width: self.config.max_width,
            min_height: self.config.min_height,
            max_height: self.config.max_height,
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("token", &self.token)
            .field("config", &self.config)
            .field("mode_config", &*self.mode_config())
            .finish_non_exhaustive()
    }
}
