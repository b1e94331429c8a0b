//! Structural checks run by the checked submit path before a job is
//! accepted. Nothing here looks at buffer contents.

use crate::{
    error::ErrorCode,
    job::{ChainOrder, CipherDirection, CipherMode, HashAlg, Job},
};

pub fn job(job: &Job<'_>) -> Result<(), ErrorCode> {
    if job.has_cipher() && job.has_hash() {
        let expected = match job.cipher_direction {
            CipherDirection::Encrypt => ChainOrder::CipherHash,
            CipherDirection::Decrypt => ChainOrder::HashCipher,
        };
        if job.chain_order != expected {
            return Err(ErrorCode::JobChainOrder);
        }
    }
    cipher(job)?;
    hash(job)
}

fn in_bounds(len: usize, offset: usize, n: usize) -> bool {
    offset.checked_add(n).is_some_and(|end| end <= len)
}

fn cipher(job: &Job<'_>) -> Result<(), ErrorCode> {
    match job.cipher_mode {
        CipherMode::Null => Ok(()),
        CipherMode::Chacha20 => {
            if job.cipher_len == 0 || job.cipher_len as u64 > chacha20::MAX_MESSAGE_LEN {
                return Err(ErrorCode::JobCipherLen);
            }
            let src = job.src.ok_or(ErrorCode::JobNullSrc)?;
            if !in_bounds(src.len(), job.cipher_offset, job.cipher_len) {
                return Err(ErrorCode::JobSrcOffset);
            }
            let dst = job.dst.as_deref().ok_or(ErrorCode::JobNullDst)?;
            if dst.len() < job.cipher_len {
                return Err(ErrorCode::JobCipherLen);
            }
            job.cipher_key.ok_or(ErrorCode::JobNullKey)?;
            let iv = job.iv.ok_or(ErrorCode::JobNullIv)?;
            if iv.len() != chacha20::NONCE_SIZE {
                return Err(ErrorCode::JobIvLen);
            }
            Ok(())
        }
    }
}

fn hash(job: &Job<'_>) -> Result<(), ErrorCode> {
    if job.hash_alg == HashAlg::Null {
        return Ok(());
    }
    let digest_len = job.hash_alg.digest_len();
    if job.hashes_dst() {
        // dst only holds what the cipher stage writes
        if !in_bounds(job.cipher_len, job.hash_offset, job.hash_len) {
            return Err(ErrorCode::JobAuthLen);
        }
    } else {
        match job.src {
            Some(src) if !in_bounds(src.len(), job.hash_offset, job.hash_len) => {
                return Err(ErrorCode::JobSrcOffset);
            }
            None if job.hash_len != 0 || job.hash_offset != 0 => {
                return Err(ErrorCode::JobNullSrc);
            }
            _ => {}
        }
    }
    let tag = job.auth_tag.as_deref().ok_or(ErrorCode::JobNullAuth)?;
    if job.hash_alg.is_hmac() {
        let key = job.auth_key.ok_or(ErrorCode::JobNullAuthKey)?;
        if key.alg() != job.hash_alg {
            return Err(ErrorCode::HashAlg);
        }
        if !(4..=digest_len).contains(&tag.len()) {
            return Err(ErrorCode::JobAuthTagLen);
        }
    } else if tag.len() != digest_len {
        return Err(ErrorCode::JobAuthTagLen);
    }
    Ok(())
}
