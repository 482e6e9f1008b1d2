//! A recording driver for exercising the core without hardware.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::{DeviceConfig, DriverFeatures};
use crate::fourcc::{format_info, Fourcc};
use crate::modeset::{
    AtomicCommitFlags, AtomicProp, AtomicRequest, Crtc, CrtcFuncs, Framebuffer, FramebufferFuncs,
    FramebufferId, ModeSet, NormalizedRequest, ObjectId, Plane, PlaneFuncs, PlaneId, PlaneType,
};
use crate::result::Error;
use crate::{Device, DrmFile, ModeConfigFuncs};

const EBUSY: linux_io::result::Error = linux_io::result::Error(16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Created(FramebufferId),
    /// Address of the destroyed framebuffer, since its id is gone by then.
    Destroyed(usize),
    SetConfig(ModeSet),
    DisablePlane(PlaneId),
    AtomicCommit(Vec<(ObjectId, AtomicProp, u64)>),
}

#[derive(Default)]
pub(crate) struct Recorder {
    events: spin::Mutex<Vec<Event>>,
    registered_during_destroy: spin::Mutex<Vec<bool>>,
    create_error: spin::Mutex<Option<Error>>,
    skip_init: AtomicBool,
    create_on: spin::Mutex<Option<Arc<Device>>>,
    fail_set_config: AtomicBool,
    fail_disable_plane: AtomicBool,
    fail_atomic_commit: AtomicBool,
    hold_commits: AtomicBool,
    commit_started: AtomicBool,
    commit_released: AtomicBool,
}

impl Recorder {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn registered_during_destroy(&self) -> Vec<bool> {
        self.registered_during_destroy.lock().clone()
    }

    pub fn fb_funcs(self: &Arc<Self>) -> Arc<dyn FramebufferFuncs> {
        Arc::clone(self) as _
    }

    pub fn plane_funcs(self: &Arc<Self>) -> Arc<dyn PlaneFuncs> {
        Arc::clone(self) as _
    }

    pub fn crtc_funcs(self: &Arc<Self>) -> Arc<dyn CrtcFuncs> {
        Arc::clone(self) as _
    }

    pub fn fail_create(&self, error: Option<Error>) {
        *self.create_error.lock() = error;
    }

    /// Make `fb_create` hand back a framebuffer it never registered.
    pub fn skip_init(&self, skip: bool) {
        self.skip_init.store(skip, Ordering::Relaxed);
    }

    /// Make `fb_create` register its framebuffer on `dev` instead of the
    /// device it was called for.
    pub fn create_on(&self, dev: Option<Arc<Device>>) {
        *self.create_on.lock() = dev;
    }

    pub fn fail_set_config(&self, fail: bool) {
        self.fail_set_config.store(fail, Ordering::Relaxed);
    }

    pub fn fail_disable_plane(&self, fail: bool) {
        self.fail_disable_plane.store(fail, Ordering::Relaxed);
    }

    pub fn fail_atomic_commit(&self, fail: bool) {
        self.fail_atomic_commit.store(fail, Ordering::Relaxed);
    }

    /// Make `atomic_commit` block until [`Self::release_commit`].
    pub fn hold_commits(&self, hold: bool) {
        self.hold_commits.store(hold, Ordering::Relaxed);
    }

    /// Spin until a held commit has started.
    pub fn wait_for_commit(&self) {
        while !self.commit_started.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    pub fn release_commit(&self) {
        self.commit_released.store(true, Ordering::Release);
    }
}

impl FramebufferFuncs for Recorder {
    fn destroy(&self, _dev: &Device, fb: &Framebuffer) {
        self.registered_during_destroy.lock().push(fb.id().is_some());
        self.record(Event::Destroyed(fb as *const Framebuffer as usize));
    }
}

impl PlaneFuncs for Recorder {
    fn disable_plane(&self, _dev: &Device, plane: &Plane) -> Result<(), Error> {
        self.record(Event::DisablePlane(plane.id()));
        if self.fail_disable_plane.load(Ordering::Relaxed) {
            return Err(Error::Driver(EBUSY));
        }
        Ok(())
    }
}

impl CrtcFuncs for Recorder {
    fn set_config(&self, _dev: &Device, set: &ModeSet) -> Result<(), Error> {
        self.record(Event::SetConfig(*set));
        if self.fail_set_config.load(Ordering::Relaxed) {
            return Err(Error::Driver(EBUSY));
        }
        Ok(())
    }
}

struct MockDriver(Arc<Recorder>);

impl ModeConfigFuncs for MockDriver {
    fn fb_create(
        &self,
        dev: &Device,
        file: &DrmFile,
        req: &NormalizedRequest,
    ) -> Result<Arc<Framebuffer>, Error> {
        if let Some(e) = *self.0.create_error.lock() {
            return Err(e);
        }
        let target = self.0.create_on.lock().clone();
        let dev = target.as_deref().unwrap_or(dev);
        let fb = Framebuffer::new(dev, file, req);
        if self.0.skip_init.load(Ordering::Relaxed) {
            return Ok(Arc::new(fb));
        }
        let fb = dev
            .framebuffer_init(fb, self.0.fb_funcs())
            .map_err(|(e, _)| e)?;
        if let Some(id) = fb.id() {
            self.0.record(Event::Created(id));
        }
        Ok(fb)
    }

    fn atomic_commit(
        &self,
        _dev: &Device,
        req: &AtomicRequest,
        flags: AtomicCommitFlags,
    ) -> Result<(), Error> {
        assert!(flags.contains(AtomicCommitFlags::ALLOW_MODESET));
        self.0.record(Event::AtomicCommit(req.iter().collect()));
        if self.0.hold_commits.load(Ordering::Relaxed) {
            self.0.commit_started.store(true, Ordering::Release);
            while !self.0.commit_released.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
        }
        if self.0.fail_atomic_commit.load(Ordering::Relaxed) {
            return Err(Error::Driver(EBUSY));
        }
        Ok(())
    }
}

pub(crate) fn test_device_with(config: DeviceConfig) -> (Device, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let dev = Device::new(config, Arc::new(MockDriver(Arc::clone(&recorder))));
    (dev, recorder)
}

/// A modesetting device with the size limits the fixture tables assume.
pub(crate) fn test_device() -> (Device, Arc<Recorder>) {
    test_device_with(
        DeviceConfig::default()
            .with_size_limits(4, 4096, 4, 4096)
            .with_features(DriverFeatures::MODESET),
    )
}

pub(crate) struct Display {
    pub crtc: Arc<Crtc>,
    pub primary: Arc<Plane>,
    pub overlay: Arc<Plane>,
}

pub(crate) fn add_display(dev: &Device, driver: &Arc<Recorder>) -> Display {
    let primary = dev.add_plane(PlaneType::Primary, driver.plane_funcs()).unwrap();
    let overlay = dev.add_plane(PlaneType::Overlay, driver.plane_funcs()).unwrap();
    let crtc = dev.add_crtc(&primary, driver.crtc_funcs()).unwrap();
    Display {
        crtc,
        primary,
        overlay,
    }
}

/// A registered 640x480 XRGB8888 framebuffer with nobody else holding it.
pub(crate) fn new_framebuffer(dev: &Device, driver: &Arc<Recorder>) -> Arc<Framebuffer> {
    let format = format_info(Fourcc::XRGB8888).unwrap();
    let fb = Framebuffer::zeroed(dev)
        .with_format(format)
        .with_size(640, 480);
    dev.framebuffer_init(fb, driver.fb_funcs()).unwrap()
}
