use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use crate::result::Error;

use super::{Crtc, CrtcId, Framebuffer, FramebufferId, ObjectType, Plane, PlaneId};

/// What an id in the registry refers to.
///
/// The registry doesn't own framebuffers, so it only holds weak pointers;
/// their lifetime is governed by the framebuffer's own reference count.
#[derive(Debug, Clone)]
pub(crate) enum ModeObject {
    Crtc(Weak<Crtc>),
    Framebuffer(Weak<Framebuffer>),
    Plane(Weak<Plane>),
}

impl ModeObject {
    fn object_type(&self) -> ObjectType {
        match self {
            ModeObject::Crtc(_) => ObjectType::Crtc,
            ModeObject::Framebuffer(_) => ObjectType::Framebuffer,
            ModeObject::Plane(_) => ObjectType::Plane,
        }
    }
}

/// A live mode object returned by a lookup.
#[derive(Debug, Clone)]
pub enum ObjectRef {
    Crtc(Arc<Crtc>),
    /// The lookup took a reference on the framebuffer, which the caller
    /// must eventually drop with [`Framebuffer::put`].
    Framebuffer(Arc<Framebuffer>),
    Plane(Arc<Plane>),
}

/// The device's table of mode objects, keyed by their shared id space.
///
/// Everything in here is guarded by the device's single mode-config lock.
#[derive(Debug, Default)]
pub(crate) struct ObjectRegistry {
    // `None` marks an id that is allocated but not yet published.
    objects: BTreeMap<u32, Option<ModeObject>>,
    fb_list: Vec<(FramebufferId, Weak<Framebuffer>)>,
    num_fb: u32,
    planes: Vec<Arc<Plane>>,
    crtcs: Vec<Arc<Crtc>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the lowest id not currently in use. Ids start at 1.
    ///
    /// The id resolves to nothing until [`Self::register`] publishes an
    /// object under it.
    pub fn allocate_id(&mut self) -> Result<u32, Error> {
        let mut candidate = 1u32;
        for &id in self.objects.keys() {
            if id != candidate {
                break;
            }
            candidate = candidate.checked_add(1).ok_or(Error::OutOfSpace)?;
        }
        self.objects.insert(candidate, None);
        Ok(candidate)
    }

    /// Publish `obj` under an id previously returned by [`Self::allocate_id`].
    pub fn register(&mut self, id: u32, obj: ModeObject) {
        debug_assert!(matches!(self.objects.get(&id), Some(None)));
        self.objects.insert(id, Some(obj));
    }

    /// Release an id. Removing an id that isn't present does nothing.
    pub fn remove(&mut self, id: u32) {
        self.objects.remove(&id);
    }

    /// Find a published object, optionally requiring a particular type.
    ///
    /// For framebuffers a reference is taken, unless the framebuffer is
    /// already on its way to being destroyed, in which case it's treated
    /// as absent.
    pub fn lookup(&self, id: u32, ty: Option<ObjectType>) -> Option<ObjectRef> {
        let obj = self.objects.get(&id)?.as_ref()?;
        if ty.is_some_and(|ty| ty != obj.object_type()) {
            return None;
        }
        match obj {
            ModeObject::Crtc(crtc) => crtc.upgrade().map(ObjectRef::Crtc),
            ModeObject::Plane(plane) => plane.upgrade().map(ObjectRef::Plane),
            ModeObject::Framebuffer(fb) => {
                let fb = fb.upgrade()?;
                fb.get_unless_zero().then_some(ObjectRef::Framebuffer(fb))
            }
        }
    }

    pub fn lookup_framebuffer(&self, id: FramebufferId) -> Option<Arc<Framebuffer>> {
        match self.lookup(id.0, Some(ObjectType::Framebuffer))? {
            ObjectRef::Framebuffer(fb) => Some(fb),
            _ => None,
        }
    }

    /// Make room for one more framebuffer on the device list.
    pub fn reserve_framebuffer(&mut self) -> Result<(), Error> {
        self.fb_list.try_reserve(1)?;
        Ok(())
    }

    /// Publish an initialized framebuffer and append it to the device list.
    pub fn add_framebuffer(&mut self, id: u32, fb: &Arc<Framebuffer>) {
        self.register(id, ModeObject::Framebuffer(Arc::downgrade(fb)));
        self.fb_list.push((FramebufferId(id), Arc::downgrade(fb)));
        self.num_fb += 1;
    }

    /// Take a framebuffer off the device list and release its id.
    /// Drop `fb` from the id table and the framebuffer list.
    ///
    /// Entries are matched by address, so a framebuffer that only shares
    /// an id with one registered here leaves the registry untouched.
    pub fn unregister_framebuffer(&mut self, fb: &Framebuffer) {
        let Some(id) = fb.id() else {
            return;
        };
        let Some(idx) = self
            .fb_list
            .iter()
            .position(|(_, weak)| core::ptr::eq(weak.as_ptr(), fb))
        else {
            return;
        };
        self.fb_list.remove(idx);
        self.num_fb -= 1;
        self.remove(id.0);
    }

    pub fn add_plane(&mut self, id: u32, plane: Arc<Plane>) {
        self.register(id, ModeObject::Plane(Arc::downgrade(&plane)));
        self.planes.push(plane);
    }

    pub fn add_crtc(&mut self, id: u32, crtc: Arc<Crtc>) {
        self.register(id, ModeObject::Crtc(Arc::downgrade(&crtc)));
        self.crtcs.push(crtc);
    }

    pub fn reserve_plane(&mut self) -> Result<(), Error> {
        self.planes.try_reserve(1)?;
        Ok(())
    }

    pub fn reserve_crtc(&mut self) -> Result<(), Error> {
        self.crtcs.try_reserve(1)?;
        Ok(())
    }

    #[inline(always)]
    pub fn num_fb(&self) -> u32 {
        self.num_fb
    }

    /// Ids of registered framebuffers, oldest first.
    pub fn fb_ids(&self) -> impl Iterator<Item = FramebufferId> + '_ {
        self.fb_list.iter().map(|(id, _)| *id)
    }

    pub fn planes(&self) -> &[Arc<Plane>] {
        &self.planes
    }

    pub fn crtcs(&self) -> &[Arc<Crtc>] {
        &self.crtcs
    }

    pub fn plane_ids(&self) -> impl Iterator<Item = PlaneId> + '_ {
        self.planes.iter().map(|p| p.id())
    }

    pub fn crtc_ids(&self) -> impl Iterator<Item = CrtcId> + '_ {
        self.crtcs.iter().map(|c| c.id())
    }
}
