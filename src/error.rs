use crate::job::Job;
use std::fmt::{Debug, Display};

/// Error codes, numbered from 2001 upwards so they never collide with
/// `errno` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    JobNullSrc = 2001,
    JobNullDst,
    JobNullKey,
    JobNullIv,
    JobNullAuth,
    JobNullAuthKey,
    JobCipherLen,
    JobAuthLen,
    JobIvLen,
    JobAuthTagLen,
    JobSrcOffset,
    JobChainOrder,
    /// Reserved. A [`CipherDirection`](crate::CipherDirection) can't hold
    /// an out-of-range value, so nothing raises this today.
    JobCipherDir,
    CipherMode,
    HashAlg,
    QueueSpace,
    SlotInUse,
    BurstSize,
    BurstOoo,
    MissingCpuFlags,
    InvalidWidth,
    SelfTest,
    /// A single-cipher burst named a key size the cipher doesn't take.
    JobKeyLen,
}

impl ErrorCode {
    const ALL: [Self; 23] = [
        Self::JobNullSrc,
        Self::JobNullDst,
        Self::JobNullKey,
        Self::JobNullIv,
        Self::JobNullAuth,
        Self::JobNullAuthKey,
        Self::JobCipherLen,
        Self::JobAuthLen,
        Self::JobIvLen,
        Self::JobAuthTagLen,
        Self::JobSrcOffset,
        Self::JobChainOrder,
        Self::JobCipherDir,
        Self::CipherMode,
        Self::HashAlg,
        Self::QueueSpace,
        Self::SlotInUse,
        Self::BurstSize,
        Self::BurstOoo,
        Self::MissingCpuFlags,
        Self::InvalidWidth,
        Self::SelfTest,
        Self::JobKeyLen,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::JobNullSrc => "invalid job, null source buffer",
            Self::JobNullDst => "invalid job, null destination buffer",
            Self::JobNullKey => "invalid job, null cipher key",
            Self::JobNullIv => "invalid job, null IV",
            Self::JobNullAuth => "invalid job, null authentication tag buffer",
            Self::JobNullAuthKey => "invalid job, null authentication key",
            Self::JobCipherLen => "invalid job, cipher length",
            Self::JobAuthLen => "invalid job, authentication length",
            Self::JobIvLen => "invalid job, IV length",
            Self::JobAuthTagLen => "invalid job, authentication tag length",
            Self::JobSrcOffset => "invalid job, source offset out of bounds",
            Self::JobChainOrder => "invalid job, chain order does not match cipher direction",
            Self::JobCipherDir => "invalid job, cipher direction",
            Self::CipherMode => "invalid job, unsupported cipher mode",
            Self::HashAlg => "invalid job, unsupported hash algorithm",
            Self::QueueSpace => "no free job slot, flush or retire completed jobs first",
            Self::SlotInUse => "job slot is already owned by an unretired job",
            Self::BurstSize => "burst size exceeds the supported maximum",
            Self::BurstOoo => "burst contains the same job slot more than once",
            Self::MissingCpuFlags => "CPU lacks the features required by the selected architecture",
            Self::InvalidWidth => "unsupported lane width",
            Self::SelfTest => "known-answer self-test failed",
            Self::JobKeyLen => "invalid job, cipher key length",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for ErrorCode {}

/// Text for a numeric code as returned by [`ErrorCode::code`]. Zero means
/// success.
#[must_use]
pub fn strerror(code: i32) -> &'static str {
    match code {
        0 => "no error",
        _ => ErrorCode::from_code(code).map_or("unknown error", ErrorCode::description),
    }
}

/// A job the checked submit path refused, handed back unchanged.
pub struct Rejected<'a> {
    pub error: ErrorCode,
    pub job: Job<'a>,
}

impl Display for Rejected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job in slot {} rejected: {}", self.job.slot(), self.error)
    }
}

impl Debug for Rejected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("job", &self.job)
            .finish()
    }
}

impl std::error::Error for Rejected<'_> {}

/// A burst refused as a whole. `index` points at the first offending job;
/// every job is handed back in its original order.
pub struct BurstRejected<'a> {
    pub error: ErrorCode,
    pub index: usize,
    pub jobs: Vec<Job<'a>>,
}

impl Display for BurstRejected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "burst rejected at job {}: {}", self.index, self.error)
    }
}

impl Debug for BurstRejected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurstRejected")
            .field("error", &self.error)
            .field("index", &self.index)
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl std::error::Error for BurstRejected<'_> {}

#[cfg(test)]
mod tests {
    use super::{strerror, ErrorCode};

    #[test]
    fn codes_are_dense_from_2001() {
        for (i, e) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(e.code(), 2001 + i32::try_from(i).unwrap());
            assert_eq!(ErrorCode::from_code(e.code()), Some(*e));
        }
    }

    #[test]
    fn lookup_table() {
        assert_eq!(strerror(0), "no error");
        assert_eq!(strerror(2000), "unknown error");
        assert_eq!(strerror(-1), "unknown error");
        assert_eq!(
            strerror(ErrorCode::QueueSpace.code()),
            ErrorCode::QueueSpace.to_string()
        );
    }
}
