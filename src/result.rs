use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request was malformed in a way that isn't a geometry problem,
    /// such as a framebuffer belonging to a different device.
    InvalidArgument,
    /// A framebuffer creation request failed admission checks.
    ValidationFailed(CheckError),
    /// A source rectangle reaches outside of its framebuffer.
    OutOfSpace,
    NotFound,
    NotSupported,
    SystemMem,
    /// Opaque failure reported by a driver callback.
    Driver(linux_io::result::Error),
}

impl From<CheckError> for Error {
    #[inline(always)]
    fn from(value: CheckError) -> Self {
        Self::ValidationFailed(value)
    }
}

impl From<linux_io::result::Error> for Error {
    fn from(value: linux_io::result::Error) -> Self {
        match value {
            linux_io::result::EINVAL => Self::InvalidArgument,
            linux_io::result::ENOENT => Self::NotFound,
            linux_io::result::ENOMEM => Self::SystemMem,
            linux_io::result::ENOSPC => Self::OutOfSpace,
            linux_io::result::EOPNOTSUPP => Self::NotSupported,
            _ => Self::Driver(value),
        }
    }
}

impl Into<linux_io::result::Error> for Error {
    fn into(self) -> linux_io::result::Error {
        match self {
            Error::InvalidArgument => linux_io::result::EINVAL,
            Error::ValidationFailed(_) => linux_io::result::EINVAL,
            Error::OutOfSpace => linux_io::result::ENOSPC,
            Error::NotFound => linux_io::result::ENOENT,
            Error::NotSupported => linux_io::result::EOPNOTSUPP,
            Error::SystemMem => linux_io::result::ENOMEM,
            Error::Driver(v) => v,
        }
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    #[inline(always)]
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::SystemMem
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::ValidationFailed(reason) => write!(f, "framebuffer rejected: {reason}"),
            Error::OutOfSpace => f.write_str("source rectangle exceeds framebuffer"),
            Error::NotFound => f.write_str("no such object"),
            Error::NotSupported => f.write_str("operation not supported by device"),
            Error::SystemMem => f.write_str("out of memory"),
            Error::Driver(e) => write!(f, "driver failure (errno {})", e.0),
        }
    }
}

/// The reason a framebuffer creation request was rejected.
///
/// Plane indices refer to the slot in the request, starting at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckError {
    UnknownFormat(u32),
    UnsupportedFlags(u32),
    ModifiersNotSupported,
    WidthOutOfRange(u32),
    HeightOutOfRange(u32),
    MissingHandle { plane: usize },
    PitchTooSmall { plane: usize, pitch: u32, min_pitch: u32 },
    BufferOverflow { plane: usize },
    /// A modifier was given without the request declaring modifiers.
    ModifierWithoutFlag { plane: usize },
    /// Used planes carry different modifiers.
    ModifierMismatch { plane: usize },
    ModifierNotAllowed { plane: usize, modifier: u64 },
    /// The modifier's tiling imposes an alignment the geometry doesn't meet.
    TileMisaligned { plane: usize },
    /// A plane slot beyond the format's plane count carries data.
    UnusedPlaneNotZero { plane: usize },
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CheckError::UnknownFormat(fourcc) => write!(f, "unknown pixel format {fourcc:#010x}"),
            CheckError::UnsupportedFlags(flags) => write!(f, "unsupported flags {flags:#x}"),
            CheckError::ModifiersNotSupported => {
                f.write_str("device does not support framebuffer modifiers")
            }
            CheckError::WidthOutOfRange(w) => write!(f, "width {w} out of range"),
            CheckError::HeightOutOfRange(h) => write!(f, "height {h} out of range"),
            CheckError::MissingHandle { plane } => write!(f, "no buffer object handle for plane {plane}"),
            CheckError::PitchTooSmall {
                plane,
                pitch,
                min_pitch,
            } => write!(f, "pitch {pitch} for plane {plane} is below minimum {min_pitch}"),
            CheckError::BufferOverflow { plane } => {
                write!(f, "plane {plane} addresses beyond the 32-bit buffer range")
            }
            CheckError::ModifierWithoutFlag { plane } => {
                write!(f, "modifier on plane {plane} without the modifiers flag")
            }
            CheckError::ModifierMismatch { plane } => {
                write!(f, "modifier on plane {plane} differs from plane 0")
            }
            CheckError::ModifierNotAllowed { plane, modifier } => {
                write!(f, "modifier {modifier:#018x} on plane {plane} not allowed for format")
            }
            CheckError::TileMisaligned { plane } => {
                write!(f, "plane {plane} geometry does not fit the modifier's tiling")
            }
            CheckError::UnusedPlaneNotZero { plane } => {
                write!(f, "unused plane {plane} carries non-zero values")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_round_trip_keeps_taxonomy() {
        let e: linux_io::result::Error = Error::OutOfSpace.into();
        assert_eq!(e, linux_io::result::ENOSPC);
        assert_eq!(Error::from(e), Error::OutOfSpace);

        let e: linux_io::result::Error =
            Error::ValidationFailed(CheckError::ModifiersNotSupported).into();
        assert_eq!(e, linux_io::result::EINVAL);
    }

    #[test]
    fn unknown_errno_is_a_driver_error() {
        let e = Error::from(linux_io::result::EIO);
        assert_eq!(e, Error::Driver(linux_io::result::EIO));
        let back: linux_io::result::Error = e.into();
        assert_eq!(back, linux_io::result::EIO);
    }
}
