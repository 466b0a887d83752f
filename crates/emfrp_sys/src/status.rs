use std::fmt;

/// `em_result` as returned by every fallible engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    Ok,
    OutOfMemory,
    OutOfIndex,
    InvalidArgument,
    TypeMismatch,
    MissingIdentifier,
    CyclicReference,
    Unknown,
    ParseError,
    /// A code this table does not know about. Kept verbatim for logging.
    Other(i32),
}

impl EngineStatus {
    pub const fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::OutOfMemory,
            2 => Self::OutOfIndex,
            3 => Self::InvalidArgument,
            16 => Self::TypeMismatch,
            17 => Self::MissingIdentifier,
            18 => Self::CyclicReference,
            19 => Self::Unknown,
            20 => Self::ParseError,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::OutOfMemory => 1,
            Self::OutOfIndex => 2,
            Self::InvalidArgument => 3,
            Self::TypeMismatch => 16,
            Self::MissingIdentifier => 17,
            Self::CyclicReference => 18,
            Self::Unknown => 19,
            Self::ParseError => 20,
            Self::Other(code) => code,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::OutOfMemory => "out of memory",
            Self::OutOfIndex => "out of index",
            Self::InvalidArgument => "invalid argument",
            Self::TypeMismatch => "type mismatch",
            Self::MissingIdentifier => "missing identifier",
            Self::CyclicReference => "cyclic reference",
            Self::Unknown => "unknown error",
            Self::ParseError => "parse error",
            Self::Other(_) => "unrecognised status",
        }
    }
}

impl From<i32> for EngineStatus {
    fn from(code: i32) -> Self {
        Self::from_raw(code)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::EngineStatus;

    #[test]
    fn known_codes_round_trip() {
        for code in [0, 1, 2, 3, 16, 17, 18, 19, 20] {
            assert_eq!(EngineStatus::from_raw(code).code(), code);
        }
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let status = EngineStatus::from_raw(42);
        assert_eq!(status, EngineStatus::Other(42));
        assert_eq!(status.code(), 42);
        assert!(!status.is_ok());
        assert_eq!(status.to_string(), "unrecognised status (42)");
    }
}
