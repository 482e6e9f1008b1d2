use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::modeset::{Framebuffer, FramebufferId};
use crate::result::Error;
use crate::Device;

/// One client's open handle on a device.
///
/// Each framebuffer the client created is held here with one reference,
/// which is dropped when the client removes it or is released.
pub struct DrmFile {
    comm: String,
    fbs: spin::Mutex<Vec<Arc<Framebuffer>>>,
}

impl DrmFile {
    pub fn new(comm: &str) -> Self {
        Self {
            comm: String::from(comm),
            fbs: spin::Mutex::new(Vec::new()),
        }
    }

    #[inline(always)]
    pub fn comm(&self) -> &str {
        &self.comm
    }

    /// Ids of the framebuffers this client owns, oldest first.
    pub fn framebuffers(&self) -> Vec<FramebufferId> {
        self.fbs.lock().iter().filter_map(|fb| fb.id()).collect()
    }

    pub(crate) fn add_framebuffer(&self, fb: Arc<Framebuffer>) -> Result<(), (Error, Arc<Framebuffer>)> {
        let mut fbs = self.fbs.lock();
        if let Err(e) = fbs.try_reserve(1) {
            return Err((e.into(), fb));
        }
        fbs.push(fb);
        Ok(())
    }

    /// Take ownership of the client's reference on `fb` away from the file.
    pub(crate) fn take_framebuffer(&self, fb: &Arc<Framebuffer>) -> Option<Arc<Framebuffer>> {
        let mut fbs = self.fbs.lock();
        let idx = fbs.iter().position(|owned| Arc::ptr_eq(owned, fb))?;
        Some(fbs.remove(idx))
    }

    /// Take every framebuffer the client created on `dev`, oldest first.
    /// Ones created on other devices stay with the file.
    pub(crate) fn take_framebuffers_of(&self, dev: &Device) -> Vec<Arc<Framebuffer>> {
        let mut fbs = self.fbs.lock();
        let (mine, others): (Vec<_>, Vec<_>) = core::mem::take(&mut *fbs)
            .into_iter()
            .partition(|fb| fb.belongs_to(dev));
        *fbs = others;
        mine
    }
}

impl fmt::Debug for DrmFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrmFile")
            .field("comm", &self.comm)
            .field("fbs", &self.framebuffers())
            .finish()
    }
}
