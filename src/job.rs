use crate::error::ErrorCode;
use crypto_common::erase::Erase;
use std::fmt::{Debug, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CipherMode {
    #[default]
    Null,
    Chacha20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CipherDirection {
    #[default]
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlg {
    #[default]
    Null,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

/// Which stage runs first when a job has both a cipher and a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChainOrder {
    /// Encrypt, then authenticate the ciphertext in `dst`.
    #[default]
    CipherHash,
    /// Authenticate `src`, then decrypt it.
    HashCipher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Accepted, not yet placed in a lane.
    #[default]
    Pending,
    /// Occupying a lane.
    InBatch,
    /// Cipher stage done, hash stage outstanding.
    CompletedCipher,
    /// Hash stage done, cipher stage outstanding.
    CompletedAuth,
    Completed,
    /// Rejected after acceptance; only reachable through the unchecked path.
    InvalidArgs,
    /// A lane found the job's parameters inconsistent.
    InternalError,
    /// The operation itself failed.
    Error,
}

impl Status {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::InvalidArgs | Self::InternalError | Self::Error
        )
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::InvalidArgs | Self::InternalError | Self::Error)
    }
}

/// Algorithm family, one out-of-order engine each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// SHA-224 and SHA-256, plain and keyed.
    Sha256,
    /// SHA-384 and SHA-512, plain and keyed.
    Sha512,
    Chacha20,
}

impl Family {
    pub const ALL: [Self; 3] = [Self::Sha256, Self::Sha512, Self::Chacha20];

    #[must_use]
    pub const fn is_cipher(self) -> bool {
        matches!(self, Self::Chacha20)
    }
}

impl HashAlg {
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Null => 0,
            Self::Sha224 | Self::HmacSha224 => 28,
            Self::Sha256 | Self::HmacSha256 => 32,
            Self::Sha384 | Self::HmacSha384 => 48,
            Self::Sha512 | Self::HmacSha512 => 64,
        }
    }

    #[must_use]
    pub const fn block_len(self) -> usize {
        match self.family() {
            None => 0,
            Some(Family::Sha512) => sha512::BLOCK_LEN,
            Some(_) => sha256::BLOCK_LEN,
        }
    }

    #[must_use]
    pub const fn is_hmac(self) -> bool {
        matches!(
            self,
            Self::HmacSha224 | Self::HmacSha256 | Self::HmacSha384 | Self::HmacSha512
        )
    }

    #[must_use]
    pub const fn family(self) -> Option<Family> {
        match self {
            Self::Null => None,
            Self::Sha224 | Self::Sha256 | Self::HmacSha224 | Self::HmacSha256 => {
                Some(Family::Sha256)
            }
            Self::Sha384 | Self::Sha512 | Self::HmacSha384 | Self::HmacSha512 => {
                Some(Family::Sha512)
            }
        }
    }

    /// Plain digest of `data` with the same function, used for long HMAC keys.
    fn digest(self, data: &[u8], out: &mut [u8; 64]) -> usize {
        let n = self.digest_len();
        match self {
            Self::Sha224 | Self::HmacSha224 => out[..n].copy_from_slice(&sha256::Sha224::digest(data)),
            Self::Sha256 | Self::HmacSha256 => out[..n].copy_from_slice(&sha256::Sha256::digest(data)),
            Self::Sha384 | Self::HmacSha384 => out[..n].copy_from_slice(&sha512::Sha384::digest(data)),
            Self::Sha512 | Self::HmacSha512 => out[..n].copy_from_slice(&sha512::Sha512::digest(data)),
            Self::Null => {}
        }
        n
    }
}

/// Chaining value after absorbing one padded key block.
#[derive(Clone, Copy)]
pub(crate) enum Chaining {
    Sha256([u32; 8]),
    Sha512([u64; 8]),
}

impl Erase for Chaining {
    fn erase(&mut self) {
        match self {
            Self::Sha256(s) => s.erase(),
            Self::Sha512(s) => s.erase(),
        }
    }
}

/// HMAC key reduced to its inner and outer chaining states, so lanes never
/// see the raw key.
pub struct AuthKey {
    alg: HashAlg,
    ipad: Chaining,
    opad: Chaining,
}

impl AuthKey {
    /// Keys longer than a block are hashed first (RFC 2104).
    pub fn new(alg: HashAlg, key: &[u8]) -> Result<Self, ErrorCode> {
        if !alg.is_hmac() {
            return Err(ErrorCode::HashAlg);
        }
        let block_len = alg.block_len();
        let mut padded = [0u8; sha512::BLOCK_LEN];
        if key.len() > block_len {
            let mut digest = [0; 64];
            let n = alg.digest(key, &mut digest);
            padded[..n].copy_from_slice(&digest[..n]);
            digest.erase();
        } else {
            padded[..key.len()].copy_from_slice(key);
        }
        let mut ipad = padded;
        let mut opad = padded;
        for (i, o) in ipad.iter_mut().zip(opad.iter_mut()) {
            *i ^= 0x36;
            *o ^= 0x5c;
        }
        let ret = Self {
            alg,
            ipad: absorb(alg, &ipad),
            opad: absorb(alg, &opad),
        };
        padded.erase();
        ipad.erase();
        opad.erase();
        Ok(ret)
    }

    #[must_use]
    pub const fn alg(&self) -> HashAlg {
        self.alg
    }

    pub(crate) const fn ipad(&self) -> &Chaining {
        &self.ipad
    }

    pub(crate) const fn opad(&self) -> &Chaining {
        &self.opad
    }
}

fn absorb(alg: HashAlg, block: &[u8; sha512::BLOCK_LEN]) -> Chaining {
    match alg {
        HashAlg::HmacSha224 | HashAlg::HmacSha256 | HashAlg::Sha224 | HashAlg::Sha256 => {
            let mut state = if matches!(alg, HashAlg::HmacSha224 | HashAlg::Sha224) {
                sha256::consts::H224
            } else {
                sha256::consts::H256
            };
            let (blocks, _) = crypto_common::blocks::split_blocks::<{ sha256::BLOCK_LEN }>(
                &block[..sha256::BLOCK_LEN],
            );
            sha256::compress(&mut state, blocks);
            Chaining::Sha256(state)
        }
        _ => {
            let mut state = if matches!(alg, HashAlg::HmacSha384 | HashAlg::Sha384) {
                sha512::consts::H384
            } else {
                sha512::consts::H512
            };
            sha512::compress(&mut state, core::slice::from_ref(block));
            Chaining::Sha512(state)
        }
    }
}

impl Drop for AuthKey {
    fn drop(&mut self) {
        self.ipad.erase();
        self.opad.erase();
    }
}

impl Debug for AuthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKey")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// A 256-bit ChaCha20 key, scrubbed on drop.
pub struct CipherKey([u8; chacha20::KEY_SIZE]);

impl CipherKey {
    #[must_use]
    pub const fn new(key: [u8; chacha20::KEY_SIZE]) -> Self {
        Self(key)
    }

    pub(crate) const fn as_bytes(&self) -> &[u8; chacha20::KEY_SIZE] {
        &self.0
    }
}

impl Drop for CipherKey {
    fn drop(&mut self) {
        self.0.erase();
    }
}

impl Debug for CipherKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey { ... }")
    }
}

/// One cipher and/or hash operation.
///
/// Obtained from [`Manager::get_next_job`](crate::Manager::get_next_job),
/// filled in, then moved into the manager by a submit call. The manager
/// hands it back once it has reached a terminal [`Status`]. Every buffer is
/// borrowed for `'a`, so none of them can be touched while the job is in
/// flight.
pub struct Job<'a> {
    pub src: Option<&'a [u8]>,
    /// Receives `cipher_len` bytes at offset 0.
    pub dst: Option<&'a mut [u8]>,
    pub cipher_key: Option<&'a CipherKey>,
    pub iv: Option<&'a [u8]>,
    pub cipher_offset: usize,
    pub cipher_len: usize,
    /// Offset into `src`, or into `dst` when the ciphertext is hashed.
    pub hash_offset: usize,
    pub hash_len: usize,
    pub auth_key: Option<&'a AuthKey>,
    /// Tag output. Its length is the requested tag length.
    pub auth_tag: Option<&'a mut [u8]>,
    pub cipher_mode: CipherMode,
    pub cipher_direction: CipherDirection,
    pub hash_alg: HashAlg,
    pub chain_order: ChainOrder,
    /// Opaque to the manager. Completion order is not submission order, so
    /// this is how callers match results up.
    pub user_data: u64,
    slot: usize,
    status: Status,
}

impl<'a> Job<'a> {
    pub(crate) const fn new(slot: usize) -> Self {
        Self {
            src: None,
            dst: None,
            cipher_key: None,
            iv: None,
            cipher_offset: 0,
            cipher_len: 0,
            hash_offset: 0,
            hash_len: 0,
            auth_key: None,
            auth_tag: None,
            cipher_mode: CipherMode::Null,
            cipher_direction: CipherDirection::Encrypt,
            hash_alg: HashAlg::Null,
            chain_order: ChainOrder::CipherHash,
            user_data: 0,
            slot,
            status: Status::Pending,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        debug_assert!(!self.status.is_terminal());
        self.status = status;
    }

    /// Back to `Pending`, for a returned job that is submitted again.
    pub(crate) fn rearm(&mut self) {
        self.status = Status::Pending;
    }

    pub(crate) const fn has_cipher(&self) -> bool {
        !matches!(self.cipher_mode, CipherMode::Null)
    }

    pub(crate) const fn has_hash(&self) -> bool {
        !matches!(self.hash_alg, HashAlg::Null)
    }

    /// Whether the hash stage reads the cipher output rather than `src`.
    pub(crate) const fn hashes_dst(&self) -> bool {
        self.has_cipher() && matches!(self.chain_order, ChainOrder::CipherHash)
    }

    /// Region the hash stage authenticates, if it is in bounds. An empty
    /// message needs no buffer.
    pub(crate) fn hash_input(&self) -> Option<&[u8]> {
        let buf = if self.hashes_dst() {
            self.dst.as_deref()
        } else {
            self.src
        };
        let buf: &[u8] = match buf {
            Some(buf) => buf,
            None if self.hash_len == 0 && self.hash_offset == 0 => &[],
            None => return None,
        };
        buf.get(self.hash_offset..self.hash_offset.checked_add(self.hash_len)?)
    }

    /// Engine for the next outstanding stage, `None` once nothing is left.
    pub(crate) fn next_stage(&self) -> Option<Family> {
        let cipher = self.has_cipher().then_some(Family::Chacha20);
        let hash = self.hash_alg.family();
        match self.status {
            Status::Pending | Status::InBatch => match (cipher, hash) {
                (Some(c), Some(_)) if matches!(self.chain_order, ChainOrder::CipherHash) => {
                    Some(c)
                }
                (Some(_), Some(h)) => Some(h),
                (c, h) => c.or(h),
            },
            Status::CompletedCipher => hash,
            Status::CompletedAuth => cipher,
            _ => None,
        }
    }

    /// Status after the stage run by `family` has finished.
    pub(crate) fn stage_done(&self, family: Family) -> Status {
        match (self.status, family.is_cipher()) {
            (Status::CompletedAuth, true) | (Status::CompletedCipher, false) => Status::Completed,
            (_, true) if self.has_hash() => Status::CompletedCipher,
            (_, false) if self.has_cipher() => Status::CompletedAuth,
            _ => Status::Completed,
        }
    }
}

impl Debug for Job<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("slot", &self.slot)
            .field("status", &self.status)
            .field("cipher_mode", &self.cipher_mode)
            .field("cipher_direction", &self.cipher_direction)
            .field("hash_alg", &self.hash_alg)
            .field("chain_order", &self.chain_order)
            .field("cipher_len", &self.cipher_len)
            .field("hash_len", &self.hash_len)
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthKey, ChainOrder, CipherMode, Family, HashAlg, Job, Status};
    use crate::error::ErrorCode;

    #[test]
    fn stage_routing() {
        let mut job = Job::new(0);
        assert_eq!(job.next_stage(), None);
        job.hash_alg = HashAlg::HmacSha384;
        assert_eq!(job.next_stage(), Some(Family::Sha512));
        assert_eq!(job.stage_done(Family::Sha512), Status::Completed);

        job.cipher_mode = CipherMode::Chacha20;
        assert_eq!(job.next_stage(), Some(Family::Chacha20));
        job.set_status(job.stage_done(Family::Chacha20));
        assert_eq!(job.status(), Status::CompletedCipher);
        assert_eq!(job.next_stage(), Some(Family::Sha512));
        assert_eq!(job.stage_done(Family::Sha512), Status::Completed);

        let mut job = Job::new(1);
        job.cipher_mode = CipherMode::Chacha20;
        job.hash_alg = HashAlg::Sha224;
        job.chain_order = ChainOrder::HashCipher;
        assert_eq!(job.next_stage(), Some(Family::Sha256));
        job.set_status(job.stage_done(Family::Sha256));
        assert_eq!(job.status(), Status::CompletedAuth);
        assert_eq!(job.next_stage(), Some(Family::Chacha20));
    }

    #[test]
    fn hash_input_follows_chain_order() {
        let src = [1u8; 16];
        let mut dst = [2u8; 16];
        let mut job = Job::new(0);
        job.src = Some(&src);
        job.dst = Some(&mut dst);
        job.hash_alg = HashAlg::Sha256;
        job.hash_offset = 4;
        job.hash_len = 8;
        assert_eq!(job.hash_input(), Some(&[1u8; 8][..]));
        job.cipher_mode = CipherMode::Chacha20;
        assert_eq!(job.hash_input(), Some(&[2u8; 8][..]));
        job.hash_len = 13;
        assert_eq!(job.hash_input(), None);
    }

    #[test]
    fn empty_message_needs_no_buffer() {
        let mut job = Job::new(0);
        job.hash_alg = HashAlg::Sha256;
        assert_eq!(job.hash_input(), Some(&[][..]));
        job.hash_len = 1;
        assert_eq!(job.hash_input(), None);
        job.hash_len = 0;
        job.hash_offset = 1;
        assert_eq!(job.hash_input(), None);
    }

    #[test]
    fn auth_key_needs_hmac() {
        assert_eq!(
            AuthKey::new(HashAlg::Sha256, b"k").err(),
            Some(ErrorCode::HashAlg)
        );
        assert_eq!(
            AuthKey::new(HashAlg::HmacSha512, b"k").map(|k| k.alg()),
            Ok(HashAlg::HmacSha512)
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Completed.is_terminal());
        assert!(!Status::Completed.is_error());
        assert!(Status::InternalError.is_error());
        assert!(!Status::CompletedCipher.is_terminal());
    }
}
