bitflags::bitflags! {
    /// Capabilities the driver behind a [`crate::Device`] declares.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverFeatures: u32 {
        /// The driver does kernel modesetting, and so accepts framebuffers.
        const MODESET = 1 << 1;
        /// The driver reconfigures planes and CRTCs through atomic commits.
        const ATOMIC = 1 << 19;
    }
}

/// Static mode-config limits and capabilities of a device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    /// Set when the hardware can't scan out anything but linear buffers,
    /// in which case requests declaring modifiers are refused outright.
    pub fb_modifiers_not_supported: bool,
    pub features: DriverFeatures,
}

impl DeviceConfig {
    pub fn with_size_limits(
        mut self,
        min_width: u32,
        max_width: u32,
        min_height: u32,
        max_height: u32,
    ) -> Self {
        self.min_width = min_width;
        self.max_width = max_width;
        self.min_height = min_height;
        self.max_height = max_height;
        self
    }

    pub fn with_features(mut self, features: DriverFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn without_modifiers(mut self) -> Self {
        self.fb_modifiers_not_supported = true;
        self
    }

    #[inline(always)]
    pub fn has_feature(&self, feature: DriverFeatures) -> bool {
        self.features.contains(feature)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            min_width: 1,
            max_width: 8192,
            min_height: 1,
            max_height: 8192,
            fb_modifiers_not_supported: false,
            features: DriverFeatures::MODESET,
        }
    }
}
