use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::DriverFeatures;
use crate::{Device, DrmFile};

use super::{AtomicCommitFlags, AtomicProp, AtomicRequest, Crtc, Framebuffer, ModeSet, Plane, PlaneType};

/// Drop a reference the caller owns on `fb`, first taking the framebuffer
/// off any plane still showing it if others hold references too.
pub(crate) fn remove_framebuffer(dev: &Device, fb: Arc<Framebuffer>) {
    if fb.refcount() > 1 {
        detach_framebuffer(dev, &fb);
    }
    fb.put(dev);
}

/// Release everything a client owns on `dev`, in the order it created them.
pub(crate) fn release_client(dev: &Device, file: &DrmFile) {
    let fbs = file.take_framebuffers_of(dev);
    if !fbs.is_empty() {
        log::debug!("releasing {} framebuffer(s) owned by {}", fbs.len(), file.comm());
    }
    for fb in fbs {
        remove_framebuffer(dev, fb);
    }
}

/// Stop every plane and CRTC from scanning out `fb`.
///
/// Failures are logged and don't stop the remaining objects from being
/// processed; a plane the driver refused to disable keeps its reference.
///
/// Every plane and CRTC modeset lock is held from deciding which objects
/// show `fb` until their bindings are cleared, so the driver callbacks made
/// here must not update planes themselves.
pub(crate) fn detach_framebuffer(dev: &Device, fb: &Framebuffer) {
    let (planes, crtcs) = dev.mode_objects();
    let released = {
        let _locks = ModesetLocks::lock_all(&planes, &crtcs);
        if dev.config().has_feature(DriverFeatures::ATOMIC) {
            detach_atomic(dev, fb, &planes, &crtcs)
        } else {
            detach_legacy(dev, fb, &planes, &crtcs)
        }
    };
    for old in released {
        old.put(dev);
    }
}

/// The modeset locks of every plane and then every CRTC, each kind taken
/// in registry order.
struct ModesetLocks<'a> {
    _planes: Vec<spin::MutexGuard<'a, ()>>,
    _crtcs: Vec<spin::MutexGuard<'a, ()>>,
}

impl<'a> ModesetLocks<'a> {
    fn lock_all(planes: &'a [Arc<Plane>], crtcs: &'a [Arc<Crtc>]) -> Self {
        let _planes = planes.iter().map(|plane| plane.lock_modeset()).collect();
        let _crtcs = crtcs.iter().map(|crtc| crtc.lock_modeset()).collect();
        Self { _planes, _crtcs }
    }
}

fn primary_crtc<'a>(crtcs: &'a [Arc<Crtc>], plane: &Plane) -> Option<&'a Arc<Crtc>> {
    let crtc_id = plane.crtc()?;
    crtcs
        .iter()
        .find(|crtc| crtc.id() == crtc_id && core::ptr::eq(Arc::as_ptr(crtc.primary()), plane))
}

fn detach_atomic(
    dev: &Device,
    fb: &Framebuffer,
    planes: &[Arc<Plane>],
    crtcs: &[Arc<Crtc>],
) -> Vec<Arc<Framebuffer>> {
    let planes: Vec<&Arc<Plane>> = planes.iter().filter(|plane| plane.shows(fb)).collect();
    if planes.is_empty() {
        return Vec::new();
    }

    let mut req = AtomicRequest::new();
    let mut disabled_crtcs = Vec::new();
    for plane in planes.iter() {
        if plane.plane_type() == PlaneType::Primary {
            if let Some(crtc) = primary_crtc(crtcs, plane) {
                req.set_property(crtc.id().into(), AtomicProp::Active, 0);
                req.set_property(crtc.id().into(), AtomicProp::ModeId, 0);
                disabled_crtcs.push(crtc);
            }
        }
        req.set_property(plane.id().into(), AtomicProp::FbId, 0);
        req.set_property(plane.id().into(), AtomicProp::CrtcId, 0);
    }

    if let Err(e) = dev
        .funcs()
        .atomic_commit(dev, &req, AtomicCommitFlags::ALLOW_MODESET)
    {
        log::error!(
            "failed to disable {} plane(s) showing framebuffer {:?}: {}",
            planes.len(),
            fb.id(),
            e
        );
        return Vec::new();
    }

    for crtc in disabled_crtcs {
        crtc.set_active(false);
    }
    planes
        .into_iter()
        .filter_map(|plane| plane.clear_if_shows(fb))
        .collect()
}

fn detach_legacy(
    dev: &Device,
    fb: &Framebuffer,
    planes: &[Arc<Plane>],
    crtcs: &[Arc<Crtc>],
) -> Vec<Arc<Framebuffer>> {
    let mut released = Vec::new();

    for crtc in crtcs.iter() {
        let primary = crtc.primary();
        if !primary.shows(fb) {
            continue;
        }
        match crtc.funcs().set_config(dev, &ModeSet::disable(crtc.id())) {
            Ok(()) => {
                crtc.set_active(false);
                released.extend(primary.clear_if_shows(fb));
            }
            Err(e) => log::error!("failed to disable CRTC {}: {}", crtc.id().0, e),
        }
    }

    for plane in planes.iter() {
        if !plane.shows(fb) {
            continue;
        }
        match plane.funcs().disable_plane(dev, plane) {
            Ok(()) => released.extend(plane.clear_if_shows(fb)),
            Err(e) => log::error!("failed to disable plane {}: {}", plane.id().0, e),
        }
    }

    released
}
