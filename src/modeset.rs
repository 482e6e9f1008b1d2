use alloc::vec::Vec;

mod atomic;
mod check;
mod framebuffer;
mod plane;
mod registry;
mod release;
mod request;

pub use atomic::*;
pub use check::*;
pub use framebuffer::*;
pub use plane::*;
pub use registry::ObjectRef;
pub(crate) use registry::ObjectRegistry;
pub use request::*;

pub(crate) use release::{release_client, remove_framebuffer};

pub const DRM_MODE_OBJECT_CRTC: u32 = 0xcccccccc;
pub const DRM_MODE_OBJECT_FB: u32 = 0xfbfbfbfb;
pub const DRM_MODE_OBJECT_PLANE: u32 = 0xeeeeeeee;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CrtcId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PlaneId(pub u32);

/// The kinds of object sharing the device's id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectType {
    Crtc = DRM_MODE_OBJECT_CRTC,
    Framebuffer = DRM_MODE_OBJECT_FB,
    Plane = DRM_MODE_OBJECT_PLANE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectId {
    Crtc(CrtcId),
    Framebuffer(FramebufferId),
    Plane(PlaneId),
}

impl ObjectId {
    pub fn as_raw_type_and_id(self) -> (u32, u32) {
        match self {
            ObjectId::Crtc(id) => (DRM_MODE_OBJECT_CRTC, id.0),
            ObjectId::Framebuffer(id) => (DRM_MODE_OBJECT_FB, id.0),
            ObjectId::Plane(id) => (DRM_MODE_OBJECT_PLANE, id.0),
        }
    }

    pub fn object_type(self) -> ObjectType {
        match self {
            ObjectId::Crtc(_) => ObjectType::Crtc,
            ObjectId::Framebuffer(_) => ObjectType::Framebuffer,
            ObjectId::Plane(_) => ObjectType::Plane,
        }
    }
}

impl From<CrtcId> for ObjectId {
    fn from(value: CrtcId) -> Self {
        Self::Crtc(value)
    }
}

impl From<FramebufferId> for ObjectId {
    fn from(value: FramebufferId) -> Self {
        Self::Framebuffer(value)
    }
}

impl From<PlaneId> for ObjectId {
    fn from(value: PlaneId) -> Self {
        Self::Plane(value)
    }
}

/// Snapshot of the mode objects a device currently has.
#[derive(Debug)]
pub struct DeviceResources {
    pub fb_ids: Vec<FramebufferId>,
    pub crtc_ids: Vec<CrtcId>,
    pub plane_ids: Vec<PlaneId>,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}
