use alloc::vec::Vec;

use crate::config::DeviceConfig;
use crate::fourcc::{format_info, FormatInfo, Modifier};
use crate::result::CheckError;

use super::request::{FbCmdFlags, FbPlane, FramebufferRequest, NormalizedRequest, MAX_PLANES};

/// Decide whether a framebuffer request may be handed to the driver.
///
/// This doesn't touch any device state, so it can run concurrently with
/// anything else. The first failing rule determines the reported reason.
pub fn check_request(
    req: &FramebufferRequest,
    config: &DeviceConfig,
) -> Result<NormalizedRequest, CheckError> {
    check(req, config).inspect_err(|reason| {
        log::debug!("rejecting framebuffer request: {reason}");
    })
}

fn check(req: &FramebufferRequest, config: &DeviceConfig) -> Result<NormalizedRequest, CheckError> {
    // Without known flags we can't even tell how to read the modifiers.
    let flags = FbCmdFlags::from_bits(req.flags).ok_or(CheckError::UnsupportedFlags(req.flags))?;
    let explicit = flags.contains(FbCmdFlags::MODIFIERS);

    let info = format_info(req.pixel_format).ok_or(CheckError::UnknownFormat(req.pixel_format.0))?;

    if req.width < config.min_width || req.width > config.max_width {
        return Err(CheckError::WidthOutOfRange(req.width));
    }
    if req.height < config.min_height || req.height > config.max_height {
        return Err(CheckError::HeightOutOfRange(req.height));
    }

    if explicit && config.fb_modifiers_not_supported {
        return Err(CheckError::ModifiersNotSupported);
    }
    if !explicit {
        if let Some(plane) = req.modifier.iter().position(|m| !m.is_linear()) {
            return Err(CheckError::ModifierWithoutFlag { plane });
        }
    }

    let num_planes = info.plane_count();
    for plane in 0..num_planes {
        check_plane_geometry(req, info, plane)?;
    }

    let modifier = if explicit { req.modifier[0] } else { Modifier::LINEAR };
    for plane in 0..num_planes {
        if req.modifier[plane] != modifier {
            return Err(CheckError::ModifierMismatch { plane });
        }
        if !info.admits_modifier(modifier) {
            return Err(CheckError::ModifierNotAllowed {
                plane,
                modifier: modifier.0,
            });
        }
        if let Some(align) = modifier.tile_alignment() {
            if info.plane_width(req.width, plane) % align.width != 0
                || info.plane_height(req.height, plane) % align.height != 0
                || req.pitches[plane] % align.pitch != 0
            {
                return Err(CheckError::TileMisaligned { plane });
            }
        }
    }

    // Legacy clients routinely leave stale values in the trailing slots,
    // so those are only held to account when modifiers were declared.
    if explicit {
        for plane in num_planes..MAX_PLANES {
            if req.handles[plane] != 0
                || req.pitches[plane] != 0
                || req.offsets[plane] != 0
                || !req.modifier[plane].is_linear()
            {
                return Err(CheckError::UnusedPlaneNotZero { plane });
            }
        }
    }

    let mut planes = Vec::with_capacity(num_planes);
    for plane in 0..num_planes {
        planes.push(FbPlane {
            handle: req.handles[plane],
            pitch: req.pitches[plane],
            offset: req.offsets[plane],
        });
    }

    Ok(NormalizedRequest {
        width: req.width,
        height: req.height,
        format: info,
        flags,
        modifier,
        planes,
    })
}

fn check_plane_geometry(
    req: &FramebufferRequest,
    info: &FormatInfo,
    plane: usize,
) -> Result<(), CheckError> {
    if req.handles[plane] == 0 {
        return Err(CheckError::MissingHandle { plane });
    }

    let pitch = req.pitches[plane] as u64;
    let min_pitch = info.min_pitch(plane, req.width);
    if pitch < min_pitch {
        return Err(CheckError::PitchTooSmall {
            plane,
            pitch: req.pitches[plane],
            min_pitch: min_pitch.min(u32::MAX as u64) as u32,
        });
    }

    // Last byte the scanout engine could touch, computed wide so that
    // it can't wrap before being compared.
    let plane_height = info.plane_height(req.height, plane) as u64;
    let end = req.offsets[plane] as u64 + plane_height.saturating_sub(1) * pitch + min_pitch;
    if end > u32::MAX as u64 {
        return Err(CheckError::BufferOverflow { plane });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::{Fourcc, AFBC_FORMAT_MOD_SPARSE, AFBC_FORMAT_MOD_YTR};
    use crate::modeset::request::DRM_MODE_FB_MODIFIERS as MODS;

    const MIN: u32 = 4;
    const MAX: u32 = 4096;

    const SPARSE: Modifier = Modifier::arm_afbc(AFBC_FORMAT_MOD_SPARSE);
    const YTR: Modifier = Modifier::arm_afbc(AFBC_FORMAT_MOD_YTR);
    const SPARSE_YTR: Modifier = Modifier::arm_afbc(AFBC_FORMAT_MOD_SPARSE | AFBC_FORMAT_MOD_YTR);
    const TILE: Modifier = Modifier::SAMSUNG_64_32_TILE;

    fn config() -> DeviceConfig {
        DeviceConfig::default().with_size_limits(MIN, MAX, MIN, MAX)
    }

    fn fb(width: u32, height: u32, format: Fourcc) -> FramebufferRequest {
        FramebufferRequest::new(width, height, format)
    }

    fn with(mut req: FramebufferRequest, handles: [u32; 4], pitches: [u32; 4]) -> FramebufferRequest {
        req.handles = handles;
        req.pitches = pitches;
        req
    }

    fn offsets(mut req: FramebufferRequest, offsets: [u32; 4]) -> FramebufferRequest {
        req.offsets = offsets;
        req
    }

    fn mods(mut req: FramebufferRequest, modifier: [Modifier; 4]) -> FramebufferRequest {
        req.modifier = modifier;
        req
    }

    fn cases() -> Vec<(&'static str, bool, FramebufferRequest)> {
        use Fourcc as F;
        let z = Modifier::LINEAR;
        let half = MAX.div_ceil(2);
        let abgr = |w, h| fb(w, h, F::ABGR8888);
        let abgr_max = || with(abgr(MAX, MAX), [1, 0, 0, 0], [4 * MAX, 0, 0, 0]);
        let nv12_max = || with(fb(MAX, MAX, F::NV12), [1, 1, 0, 0], [MAX, MAX, 0, 0]);
        let yvu_max = || with(fb(MAX, MAX, F::YVU420), [1, 1, 1, 0], [MAX, half, half, 0]);
        let x0l2_max = || with(fb(MAX, MAX, F::X0L2), [1, 0, 0, 0], [2 * MAX + 1, 0, 0, 0]);

        alloc::vec![
            ("ABGR8888 normal sizes", true, with(abgr(600, 600), [1, 0, 0, 0], [4 * 600, 0, 0, 0])),
            ("ABGR8888 max sizes", true, abgr_max()),
            ("ABGR8888 pitch above minimum", true, with(abgr(MAX, MAX), [1, 0, 0, 0], [4 * MAX + 1, 0, 0, 0])),
            ("ABGR8888 pitch below minimum", false, with(abgr(MAX, MAX), [1, 0, 0, 0], [4 * MAX - 1, 0, 0, 0])),
            ("ABGR8888 width too large", false, with(abgr(MAX + 1, MAX), [1, 0, 0, 0], [4 * (MAX + 1), 0, 0, 0])),
            ("ABGR8888 missing handle", false, with(abgr(MAX, MAX), [0, 0, 0, 0], [4 * MAX, 0, 0, 0])),
            ("no pixel format", false, with(fb(MAX, MAX, F(0)), [1, 0, 0, 0], [4 * MAX, 0, 0, 0])),
            ("ABGR8888 zero width", false, with(abgr(0, MAX), [1, 0, 0, 0], [4 * MAX, 0, 0, 0])),
            ("ABGR8888 zero height", false, with(abgr(MAX, 0), [1, 0, 0, 0], [4 * MAX, 0, 0, 0])),
            ("ABGR8888 offset runs past 4GiB", false, offsets(abgr_max(), [u32::MAX - 1, 0, 0, 0])),
            ("ABGR8888 large offset", true, offsets(abgr_max(), [u32::MAX / 2, 0, 0, 0])),
            (
                "ABGR8888 offset on unused plane with modifiers",
                false,
                offsets(abgr_max(), [u32::MAX / 2, u32::MAX / 2, 0, 0]).with_flags(MODS),
            ),
            ("ABGR8888 unknown flag", false, offsets(abgr_max(), [u32::MAX / 2, 0, 0, 0]).with_flags(1 << 2)),
            (
                "ABGR8888 modifiers flag without modifiers",
                true,
                offsets(abgr_max(), [u32::MAX / 2, 0, 0, 0]).with_flags(MODS),
            ),
            ("ABGR8888 compressed", true, mods(abgr_max(), [YTR, z, z, z]).with_flags(MODS)),
            ("ABGR8888 NV12-only tiling", false, mods(abgr_max(), [TILE, z, z, z]).with_flags(MODS)),
            (
                "ABGR8888 extra pitch without modifiers",
                true,
                with(abgr(MAX, MAX), [1, 0, 0, 0], [4 * MAX, 4 * MAX, 0, 0]),
            ),
            (
                "ABGR8888 extra pitch with modifiers",
                false,
                with(abgr(MAX, MAX), [1, 0, 0, 0], [4 * MAX, 4 * MAX, 0, 0]).with_flags(MODS),
            ),
            ("NV12 normal sizes", true, with(fb(600, 600, F::NV12), [1, 1, 0, 0], [600, 600, 0, 0])),
            ("NV12 max sizes", true, nv12_max()),
            ("NV12 chroma pitch too small", false, with(fb(MAX, MAX, F::NV12), [1, 1, 0, 0], [MAX, MAX - 1, 0, 0])),
            ("NV12 tiling without modifiers flag", false, mods(nv12_max(), [TILE, z, z, z])),
            ("NV12 tiling on luma only", false, mods(nv12_max(), [TILE, z, z, z]).with_flags(MODS)),
            ("NV12 tiled", true, mods(nv12_max(), [TILE, TILE, z, z]).with_flags(MODS)),
            ("NV12 tiling on both without flag", false, mods(nv12_max(), [TILE, TILE, z, z])),
            ("NV12 modifier for unused plane", false, mods(nv12_max(), [TILE, TILE, TILE, z]).with_flags(MODS)),
            (
                "NV12 handle for unused plane",
                false,
                with(fb(MAX, MAX, F::NV12), [1, 1, 1, 0], [MAX, MAX, 0, 0]).with_flags(MODS),
            ),
            (
                "NV12 handle for unused plane without modifiers",
                true,
                with(fb(600, 600, F::NV12), [1, 1, 1, 0], [600, 600, 600, 0]),
            ),
            (
                "NV12 tiling with misaligned width",
                false,
                mods(with(fb(4000, MAX, F::NV12), [1, 1, 0, 0], [4096, 4096, 0, 0]), [TILE, TILE, z, z])
                    .with_flags(MODS),
            ),
            (
                "YVU420 modifiers flag without modifier",
                true,
                with(fb(600, 600, F::YVU420), [1, 1, 1, 0], [600, 300, 300, 0]).with_flags(MODS),
            ),
            ("YVU420 normal sizes", true, with(fb(600, 600, F::YVU420), [1, 1, 1, 0], [600, 300, 300, 0])),
            ("YVU420 max sizes", true, yvu_max()),
            (
                "YVU420 chroma pitch too small",
                false,
                with(fb(MAX, MAX, F::YVU420), [1, 1, 1, 0], [MAX, half - 1, half, 0]),
            ),
            (
                "YVU420 different pitches",
                true,
                with(fb(MAX, MAX, F::YVU420), [1, 1, 1, 0], [MAX, half + 1, half + 7, 0]),
            ),
            (
                "YVU420 different offsets and pitches",
                true,
                offsets(
                    with(fb(MAX, MAX, F::YVU420), [1, 1, 1, 0], [MAX, half + 1, half + 7, 0]),
                    [MAX, MAX + MAX * MAX, MAX + 2 * MAX * MAX, 0],
                ),
            ),
            ("YVU420 modifier on plane 0 without flag", false, mods(yvu_max(), [SPARSE, z, z, z])),
            ("YVU420 modifier on planes 0 and 1 without flag", false, mods(yvu_max(), [SPARSE, SPARSE, z, z])),
            (
                "YVU420 modifier on planes 0 and 1 with flag",
                false,
                mods(yvu_max(), [SPARSE, SPARSE, z, z]).with_flags(MODS),
            ),
            ("YVU420 compressed", true, mods(yvu_max(), [SPARSE, SPARSE, SPARSE, z]).with_flags(MODS)),
            (
                "YVU420 mixed compression modes",
                false,
                mods(yvu_max(), [SPARSE, SPARSE_YTR, SPARSE, z]).with_flags(MODS),
            ),
            (
                "YVU420 modifier for unused plane",
                false,
                mods(yvu_max(), [SPARSE, SPARSE, SPARSE, SPARSE]).with_flags(MODS),
            ),
            (
                "YUV420_10BIT linear",
                false,
                mods(with(fb(MAX, MAX, F::YUV420_10BIT), [1, 0, 0, 0], [MAX, 0, 0, 0]), [z, z, z, z])
                    .with_flags(MODS),
            ),
            (
                "YUV420_10BIT without modifiers",
                false,
                with(fb(MAX, MAX, F::YUV420_10BIT), [1, 0, 0, 0], [MAX, 0, 0, 0]),
            ),
            (
                "YUV420_10BIT compressed",
                true,
                mods(with(fb(MAX, MAX, F::YUV420_10BIT), [1, 0, 0, 0], [MAX, 0, 0, 0]), [SPARSE, z, z, z])
                    .with_flags(MODS),
            ),
            ("X0L2 normal sizes", true, with(fb(600, 600, F::X0L2), [1, 0, 0, 0], [1200, 0, 0, 0])),
            ("X0L2 max sizes", true, with(fb(MAX, MAX, F::X0L2), [1, 0, 0, 0], [2 * MAX, 0, 0, 0])),
            ("X0L2 pitch below minimum", false, with(fb(MAX, MAX, F::X0L2), [1, 0, 0, 0], [2 * MAX - 1, 0, 0, 0])),
            ("X0L2 pitch above minimum", true, x0l2_max()),
            (
                "X0L2 handle for unused plane",
                false,
                with(fb(MAX, MAX, F::X0L2), [1, 1, 0, 0], [2 * MAX + 1, 0, 0, 0]).with_flags(MODS),
            ),
            ("X0L2 offset for unused plane without flag", true, offsets(x0l2_max(), [0, 0, 3, 0])),
            ("X0L2 modifier without flag", false, mods(x0l2_max(), [SPARSE, z, z, z])),
            ("X0L2 compressed", true, mods(x0l2_max(), [SPARSE, z, z, z]).with_flags(MODS)),
            (
                "X0L2 modifier for unused plane",
                false,
                mods(x0l2_max(), [SPARSE, SPARSE, z, z]).with_flags(MODS),
            ),
        ]
    }

    #[test]
    fn admission_table() {
        let config = config();
        for (name, accepted, req) in cases() {
            let result = check_request(&req, &config);
            assert_eq!(result.is_ok(), accepted, "{name}: {result:?}");
        }
    }

    #[test]
    fn size_limits_are_inclusive() {
        let config = config();
        for (w, h) in [(MIN, MIN), (MIN, MAX), (MAX, MIN), (MAX, MAX), (600, 4)] {
            let req = with(fb(w, h, Fourcc::XRGB8888), [1, 0, 0, 0], [4 * w, 0, 0, 0]);
            assert!(check_request(&req, &config).is_ok(), "{w}x{h}");
        }
        let req = with(fb(MIN - 1, MIN, Fourcc::XRGB8888), [1, 0, 0, 0], [4 * MAX, 0, 0, 0]);
        assert_eq!(check_request(&req, &config).unwrap_err(), CheckError::WidthOutOfRange(MIN - 1));
        let req = with(fb(MIN, MAX + 1, Fourcc::XRGB8888), [1, 0, 0, 0], [4 * MAX, 0, 0, 0]);
        assert_eq!(check_request(&req, &config).unwrap_err(), CheckError::HeightOutOfRange(MAX + 1));
    }

    #[test]
    fn one_byte_below_min_pitch_always_fails() {
        let config = config();
        for format in [Fourcc::C8, Fourcc::RGB565, Fourcc::RGB888, Fourcc::ABGR8888, Fourcc::YUYV] {
            let info = format_info(format).unwrap();
            for width in [MIN, 5, 601, 1919, MAX] {
                let min = info.min_pitch(0, width) as u32;
                let ok = with(fb(width, 16, format), [1, 0, 0, 0], [min, 0, 0, 0]);
                assert!(check_request(&ok, &config).is_ok(), "{format:?} {width}");
                let short = with(fb(width, 16, format), [1, 0, 0, 0], [min - 1, 0, 0, 0]);
                assert!(
                    matches!(
                        check_request(&short, &config),
                        Err(CheckError::PitchTooSmall { plane: 0, .. })
                    ),
                    "{format:?} {width}"
                );
            }
        }
    }

    #[test]
    fn legacy_requests_ignore_trailing_slots() {
        let config = config();
        let req = offsets(
            with(fb(64, 64, Fourcc::XRGB8888), [1, 9, 9, 9], [256, 17, 17, 17]),
            [0, 5, 5, 5],
        );
        let norm = check_request(&req, &config).unwrap();
        assert_eq!(norm.planes().len(), 1);
        assert_eq!(
            norm.planes()[0],
            FbPlane {
                handle: 1,
                pitch: 256,
                offset: 0
            }
        );
        assert_eq!(norm.modifier(), Modifier::LINEAR);

        let explicit = req.with_flags(MODS);
        assert_eq!(
            check_request(&explicit, &config).unwrap_err(),
            CheckError::UnusedPlaneNotZero { plane: 1 }
        );
    }

    #[test]
    fn explicit_requests_reject_each_trailing_field() {
        let config = config();
        let base = || with(fb(64, 64, Fourcc::NV12), [1, 1, 0, 0], [64, 64, 0, 0]).with_flags(MODS);
        assert!(check_request(&base(), &config).is_ok());

        let mut req = base();
        req.handles[3] = 1;
        assert_eq!(check_request(&req, &config).unwrap_err(), CheckError::UnusedPlaneNotZero { plane: 3 });
        let mut req = base();
        req.pitches[2] = 64;
        assert_eq!(check_request(&req, &config).unwrap_err(), CheckError::UnusedPlaneNotZero { plane: 2 });
        let mut req = base();
        req.offsets[2] = 1;
        assert_eq!(check_request(&req, &config).unwrap_err(), CheckError::UnusedPlaneNotZero { plane: 2 });
    }

    #[test]
    fn tile_alignment_applies_to_each_plane() {
        let config = config();
        let tiled = |w: u32, h: u32| {
            mods(
                with(fb(w, h, Fourcc::NV12), [1, 1, 0, 0], [w, w, 0, 0]),
                [Modifier::SAMSUNG_64_32_TILE, Modifier::SAMSUNG_64_32_TILE, Modifier::LINEAR, Modifier::LINEAR],
            )
            .with_flags(MODS)
        };

        assert!(check_request(&tiled(256, 64), &config).is_ok());
        // The luma plane is aligned but the half-size chroma plane isn't.
        assert_eq!(
            check_request(&tiled(128, 32), &config).unwrap_err(),
            CheckError::TileMisaligned { plane: 1 }
        );
        assert_eq!(
            check_request(&tiled(256, 32), &config).unwrap_err(),
            CheckError::TileMisaligned { plane: 1 }
        );
    }

    #[test]
    fn modifiers_refused_when_device_lacks_support() {
        let config = config().without_modifiers();
        let req = offsets(
            with(fb(MAX, MAX, Fourcc::ABGR8888), [1, 0, 0, 0], [4 * MAX, 0, 0, 0]),
            [u32::MAX / 2, 0, 0, 0],
        );
        assert!(check_request(&req, &config).is_ok());
        assert_eq!(
            check_request(&req.with_flags(MODS), &config).unwrap_err(),
            CheckError::ModifiersNotSupported
        );
    }

    #[test]
    fn normalized_request_keeps_used_planes() {
        let req = mods(
            offsets(
                with(fb(MAX, MAX, Fourcc::YVU420), [3, 4, 5, 0], [MAX, 2048, 2048, 0]),
                [0, 100, 200, 0],
            ),
            [SPARSE, SPARSE, SPARSE, Modifier::LINEAR],
        )
        .with_flags(MODS);
        let norm = check_request(&req, &config()).unwrap();
        assert_eq!(norm.format().format, Fourcc::YVU420);
        assert_eq!(norm.modifier(), SPARSE);
        assert!(norm.flags().contains(FbCmdFlags::MODIFIERS));
        let handles: Vec<u32> = norm.planes().iter().map(|p| p.handle).collect();
        assert_eq!(handles, [3, 4, 5]);
        assert_eq!(norm.planes()[2].offset, 200);
    }
}
