use core::iter;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::ObjectId;

pub const DRM_MODE_ATOMIC_ALLOW_MODESET: u32 = 0x0400;

/// The standard properties the core itself needs to set when it tears
/// down scanout on its own initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AtomicProp {
    /// Plane: framebuffer to scan out, or zero for none.
    FbId,
    /// Plane: CRTC the plane feeds, or zero for none.
    CrtcId,
    /// CRTC: whether the pipe is running.
    Active,
    /// CRTC: blob id of the display mode, or zero for none.
    ModeId,
}

/// An atomic modesetting commit request.
#[derive(Debug, Default)]
pub struct AtomicRequest {
    objs: BTreeMap<(u32, u32), AtomicRequestObj>,
    total_props: u32,
}

#[derive(Debug)]
struct AtomicRequestObj {
    obj_id: ObjectId,
    props: Vec<AtomicProp>,
    prop_values: Vec<u64>,
}

impl AtomicRequest {
    pub fn new() -> Self {
        Self {
            objs: BTreeMap::new(),
            total_props: 0,
        }
    }

    pub fn set_property(&mut self, obj_id: ObjectId, prop: AtomicProp, value: u64) {
        let key = obj_id.as_raw_type_and_id();
        let obj = self.objs.entry(key).or_insert_with(|| AtomicRequestObj {
            obj_id,
            props: Vec::new(),
            prop_values: Vec::new(),
        });

        // Setting the same property twice keeps only the latest value.
        if let Some(idx) = obj.props.iter().position(|p| *p == prop) {
            obj.prop_values[idx] = value;
            return;
        }

        // Reserve first so running out of memory can't leave the two vecs
        // with different lengths.
        obj.props.reserve(1);
        obj.prop_values.reserve(1);

        obj.props.push(prop);
        obj.prop_values.push(value);
        self.total_props += 1; // panics if request contains more than u32::MAX total properties
    }

    pub fn get_property(&self, obj_id: ObjectId, prop: AtomicProp) -> Option<u64> {
        let obj = self.objs.get(&obj_id.as_raw_type_and_id())?;
        let idx = obj.props.iter().position(|p| *p == prop)?;
        Some(obj.prop_values[idx])
    }

    /// Every property assignment in the request, grouped by object.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, AtomicProp, u64)> + '_ {
        self.objs.values().flat_map(|obj| {
            iter::zip(obj.props.iter().copied(), obj.prop_values.iter().copied())
                .map(move |(prop, value)| (obj.obj_id, prop, value))
        })
    }

    #[inline(always)]
    pub fn total_props(&self) -> u32 {
        self.total_props
    }
}

/// Flags passed along with an atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicCommitFlags(pub(crate) u32);

impl AtomicCommitFlags {
    /// The commit may perform a full modeset, such as turning a CRTC off.
    pub const ALLOW_MODESET: Self = Self(DRM_MODE_ATOMIC_ALLOW_MODESET);

    #[inline(always)]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}
