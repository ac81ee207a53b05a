use std::io;

/// Result alias used throughout the ENIP core.
pub type EnipResult<T> = Result<T, EnipError>;

/// The error kinds a frame can fail with. Every variant is local to the frame that
/// triggered it; none of them propagate out of a boundary call except as a return value.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum EnipError {
    /// Not enough bytes to decode the header, or to cover the declared payload length.
    FrameUnderrun,
    /// `options` field was nonzero.
    UnsupportedOptions,
    /// Command code not in the recognized set for this transport.
    UnknownCommand,
    /// Session handle not live, or not bound to the socket that sent the frame.
    SessionUnknown,
    /// CPF payload did not parse, or a required item was missing/malformed.
    CpfMalformed,
    /// No free session slot, or no free delayed-reply slot.
    ResourceExhausted,
    /// The router/connection-manager collaborator declined to produce a reply.
    RouterError,
    /// Ambient IO failure (logger/config bootstrap); never raised mid-frame.
    Io(io::ErrorKind),
}

impl From<io::Error> for EnipError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        EnipError::Io(io_error.kind())
    }
}

/// Wire status code this error maps to when it is surfaced in a reply. `RouterError`
/// and `FrameUnderrun` have no status code of their own: the former suppresses the
/// reply outright, the latter never reaches a point where a reply could be built.
pub fn status_for(error: &EnipError) -> Option<u32> {
    match error {
        EnipError::FrameUnderrun => None,
        EnipError::UnsupportedOptions => Some(0x0069),
        EnipError::UnknownCommand => Some(0x0001),
        EnipError::SessionUnknown => Some(0x0064),
        EnipError::CpfMalformed => Some(0x0003),
        EnipError::ResourceExhausted => Some(0x0002),
        EnipError::RouterError => None,
        EnipError::Io(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_wire_codes() {
        assert_eq!(status_for(&EnipError::UnsupportedOptions), Some(0x0069));
        assert_eq!(status_for(&EnipError::UnknownCommand), Some(0x0001));
        assert_eq!(status_for(&EnipError::SessionUnknown), Some(0x0064));
        assert_eq!(status_for(&EnipError::CpfMalformed), Some(0x0003));
        assert_eq!(status_for(&EnipError::ResourceExhausted), Some(0x0002));
        assert_eq!(status_for(&EnipError::RouterError), None);
        assert_eq!(status_for(&EnipError::FrameUnderrun), None);
    }
}
