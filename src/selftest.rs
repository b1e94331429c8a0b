//! Known-answer tests run through the scheduler itself.
//!
//! The vectors go through a scratch manager with the same architecture and
//! lane layout as the one under test, so every engine and every lane kernel
//! it uses is covered.

use crate::{
    arch::Features,
    error::ErrorCode,
    job::{AuthKey, CipherKey, CipherMode, HashAlg, Status},
    manager::Manager,
};
use log::{debug, warn};
use std::fmt::Write;

struct Kat {
    alg: HashAlg,
    key: &'static [u8],
    msg: &'static [u8],
    want: &'static str,
}

const HI_THERE: &[u8] = b"Hi There";
const JEFE: &[u8] = b"what do ya want for nothing?";
const LONG_KEY_MSG: &[u8] = b"Test Using Larger Than Block-Size Key - Hash Key First";
const KEY_1: &[u8] = &[0x0b; 20];
const KEY_6: &[u8] = &[0xaa; 131];

#[rustfmt::skip]
const KATS: [Kat; 16] = [
    // FIPS 180-4
    Kat { alg: HashAlg::Sha224, key: &[], msg: b"abc",
        want: "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7" },
    Kat { alg: HashAlg::Sha256, key: &[], msg: b"abc",
        want: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad" },
    Kat { alg: HashAlg::Sha384, key: &[], msg: b"abc",
        want: "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
               8086072ba1e7cc2358baeca134c825a7" },
    Kat { alg: HashAlg::Sha512, key: &[], msg: b"abc",
        want: "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
               2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f" },
    // RFC 4231 test case 1
    Kat { alg: HashAlg::HmacSha224, key: KEY_1, msg: HI_THERE,
        want: "896fb1128abbdf196832107cd49df33f47b4b1169912ba4f53684b22" },
    Kat { alg: HashAlg::HmacSha256, key: KEY_1, msg: HI_THERE,
        want: "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7" },
    Kat { alg: HashAlg::HmacSha384, key: KEY_1, msg: HI_THERE,
        want: "afd03944d84895626b0825f4ab46907f15f9dadbe4101ec682aa034c7cebc59c\
               faea9ea9076ede7f4af152e8b2fa9cb6" },
    Kat { alg: HashAlg::HmacSha512, key: KEY_1, msg: HI_THERE,
        want: "87aa7cdea5ef619d4ff0b4241a1d6cb02379f4e2ce4ec2787ad0b30545e17cde\
               daa833b7d6b8a702038b274eaea3f4e4be9d914eeb61f1702e696c203a126854" },
    // RFC 4231 test case 2
    Kat { alg: HashAlg::HmacSha224, key: b"Jefe", msg: JEFE,
        want: "a30e01098bc6dbbf45690f3a7e9e6d0f8bbea2a39e6148008fd05e44" },
    Kat { alg: HashAlg::HmacSha256, key: b"Jefe", msg: JEFE,
        want: "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843" },
    Kat { alg: HashAlg::HmacSha384, key: b"Jefe", msg: JEFE,
        want: "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e\
               8e2240ca5e69e2c78b3239ecfab21649" },
    Kat { alg: HashAlg::HmacSha512, key: b"Jefe", msg: JEFE,
        want: "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
               9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737" },
    // RFC 4231 test case 6
    Kat { alg: HashAlg::HmacSha224, key: KEY_6, msg: LONG_KEY_MSG,
        want: "95e9a0db962095adaebe9b2d6f0dbce2d499f112f2d2b7273fa6870e" },
    Kat { alg: HashAlg::HmacSha256, key: KEY_6, msg: LONG_KEY_MSG,
        want: "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54" },
    Kat { alg: HashAlg::HmacSha384, key: KEY_6, msg: LONG_KEY_MSG,
        want: "4ece084485813e9088d2c63a041bc5b44f9ef1012a2b588f3cd11f05033ac4c6\
               0c2ef6ab4030fe8296248df163f44952" },
    Kat { alg: HashAlg::HmacSha512, key: KEY_6, msg: LONG_KEY_MSG,
        want: "80b24263c7c1a3ebb71493c1dd7be8b49b46d1f41b4aeec1121b013783f8f352\
               6b56d037e05f2598bd0fd2215d6a1e5295e64f73f63f0aec8b915a985d786598" },
];

/// RFC 8439 A.1, test vector 1: all-zero key and nonce, block 0.
const CHACHA20_BLOCK_0: &str = "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7\
                                da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586";

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Runs every vector once. `Ok(false)` means a wrong answer, `Err` means the
/// scheduler itself refused something.
fn known_answers(template: &Manager<'_>) -> Result<bool, ErrorCode> {
    let keys = KATS
        .iter()
        .map(|k| k.alg.is_hmac().then(|| AuthKey::new(k.alg, k.key)).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    let cipher_key = CipherKey::new([0; chacha20::KEY_SIZE]);
    let nonce = [0u8; chacha20::NONCE_SIZE];
    let zeros = [0u8; chacha20::BLOCK_SIZE];
    let mut keystream = [0u8; chacha20::BLOCK_SIZE];
    let mut tags = [[0u8; 64]; KATS.len()];

    let mut m = Manager::assemble(
        template.arch(),
        template.layout(),
        template.retire_policy(),
        template.features(),
    )?;
    let mut finished = Vec::with_capacity(KATS.len() + 1);
    for (i, ((kat, key), tag)) in KATS.iter().zip(&keys).zip(&mut tags).enumerate() {
        let mut job = m.get_next_job()?;
        job.hash_alg = kat.alg;
        job.src = Some(kat.msg);
        job.hash_len = kat.msg.len();
        job.auth_key = key.as_ref();
        job.auth_tag = Some(&mut tag[..kat.alg.digest_len()]);
        job.user_data = i as u64;
        finished.extend(m.submit_job(job).map_err(|r| r.error)?);
    }
    let mut job = m.get_next_job()?;
    job.cipher_mode = CipherMode::Chacha20;
    job.cipher_key = Some(&cipher_key);
    job.iv = Some(&nonce);
    job.src = Some(&zeros);
    job.cipher_len = zeros.len();
    job.dst = Some(&mut keystream);
    job.user_data = KATS.len() as u64;
    finished.extend(m.submit_job(job).map_err(|r| r.error)?);
    finished.extend(std::iter::from_fn(|| m.flush_job()));
    drop(m);

    let mut ok = finished.len() == KATS.len() + 1;
    for job in &finished {
        if job.status() != Status::Completed {
            warn!("self-test job {} ended as {:?}", job.user_data, job.status());
            ok = false;
        }
    }
    drop(finished);
    for (kat, tag) in KATS.iter().zip(&tags) {
        let got = hex(&tag[..kat.alg.digest_len()]);
        if got != kat.want {
            warn!("self-test {:?} mismatch: got {got}", kat.alg);
            ok = false;
        }
    }
    if hex(&keystream) != CHACHA20_BLOCK_0 {
        warn!("self-test chacha20 mismatch");
        ok = false;
    }
    Ok(ok)
}

/// Runs the known-answer tests with `manager`'s layout and records the
/// outcome in its feature flags.
pub fn run(manager: &mut Manager<'_>) -> Result<(), ErrorCode> {
    manager.features.insert(Features::SELF_TEST);
    manager.features.remove(Features::SELF_TEST_PASS);
    match known_answers(manager) {
        Ok(true) => {
            debug!("self-test passed on {}", manager.arch());
            manager.features.insert(Features::SELF_TEST_PASS);
            Ok(())
        }
        Ok(false) => Err(manager.fail(ErrorCode::SelfTest)),
        Err(e) => {
            warn!("self-test could not run: {e}");
            Err(manager.fail(ErrorCode::SelfTest))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        arch::{Arch, Features, WIDTHS},
        manager::{Builder, Retire},
    };

    #[test]
    fn passes_on_every_width() {
        for width in WIDTHS {
            for retire in [Retire::InOrder, Retire::Completion] {
                let m = Builder::default()
                    .arch(Arch::NoAesni)
                    .width(width)
                    .retire(retire)
                    .self_test(true)
                    .build()
                    .unwrap();
                assert!(m.features().contains(Features::SELF_TEST | Features::SELF_TEST_PASS));
            }
        }
    }

    #[test]
    fn run_on_existing_manager() {
        let mut m = crate::Manager::new().unwrap();
        assert!(!m.features().contains(Features::SELF_TEST));
        super::run(&mut m).unwrap();
        assert!(m.features().contains(Features::SELF_TEST_PASS));
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(super::hex(&[0x00, 0xab, 0x7f]), "00ab7f");
    }
}
