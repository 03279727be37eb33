//! Constant-time unpadded base64.
//!
//! The current wire format uses the URL-safe alphabet; the legacy format uses
//! the standard alphabet. Both are unpadded, and non-canonical encodings are
//! rejected.

// Code adapted from base64ct.
// Licensed from the RustCrypto developers under Apache-2.0.
// <https://github.com/RustCrypto/formats/blob/master/base64ct/LICENSE-APACHE>
#![allow(unsafe_code)]

/// Which base64 alphabet a wire field is written in.
///
/// The two differ only in the characters for values 62 and 63.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alphabet {
    /// `-` and `_`, as used by the current token format.
    UrlSafe,
    /// `+` and `/`, as used by the legacy token format.
    Standard,
}

/// Encode `bytes` as unpadded base64.
pub fn encode_string(bytes: &[u8], alphabet: Alphabet) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    let mut tmp = [0; 4];

    let (chunks, rem) = bytes.as_chunks::<3>();
    for s in chunks {
        encode_3bytes(s, &mut tmp, alphabet);
        // SAFETY: values written by `encode_3bytes` are valid one-byte UTF-8 chars
        out.push_str(unsafe { str::from_utf8_unchecked(&tmp) });
    }

    let last = encode_last(rem, &mut tmp, alphabet);
    out.push_str(unsafe { str::from_utf8_unchecked(last) });
    out
}

fn encode_last<'a>(bytes: &[u8], dst: &'a mut [u8; 4], alphabet: Alphabet) -> &'a [u8] {
    let tmp;
    let len = match *bytes {
        [] => {
            tmp = [0; 3];
            0
        }
        [a] => {
            tmp = [a, 0, 0];
            2
        }
        [a, b] => {
            tmp = [a, b, 0];
            3
        }
        [a, b, c, ..] => {
            tmp = [a, b, c];
            4
        }
    };

    encode_3bytes(&tmp, dst, alphabet);
    &dst[..len]
}

/// Decode unpadded base64, rejecting padding characters, foreign-alphabet
/// characters, and non-canonical final blocks. `None` means the input was not
/// valid base64 in the given alphabet.
pub fn decode_vec(src: &str, alphabet: Alphabet) -> Option<Vec<u8>> {
    let mut dst = vec![0; decoded_len(src.len())];
    decode_inner(src, &mut dst, alphabet)?;
    Some(dst)
}

fn decode_inner(src: &str, dst: &mut [u8], alphabet: Alphabet) -> Option<()> {
    let (src_chunks, src_rem) = src.as_bytes().as_chunks::<4>();
    let (dst_chunks, dst_rem) = dst.as_chunks_mut::<3>();

    let mut err = 0;
    for (s, d) in core::iter::zip(src_chunks, dst_chunks) {
        err |= decode_3bytes(s, d, alphabet);
    }

    err |= !(src_rem.is_empty() || src_rem.len() >= 2) as i16;
    let mut tmp_out = [0u8; 3];
    let mut tmp_in = [b'A'; 4];
    tmp_in[..src_rem.len()].copy_from_slice(src_rem);
    err |= decode_3bytes(&tmp_in, &mut tmp_out, alphabet);
    dst_rem.copy_from_slice(&tmp_out[..dst_rem.len()]);

    if err == 0 {
        validate_last_block(src.as_bytes(), dst, alphabet)
    } else {
        None
    }
}

/// Validate that the last block of the decoded data round-trips back to the
/// encoded data.
fn validate_last_block(encoded: &[u8], decoded: &[u8], alphabet: Alphabet) -> Option<()> {
    if encoded.is_empty() && decoded.is_empty() {
        return Some(());
    }

    fn last_block_start(bytes: &[u8], block_size: usize) -> usize {
        (bytes.len().saturating_sub(1) / block_size) * block_size
    }

    let enc_block = encoded.get(last_block_start(encoded, 4)..)?;
    let dec_block = decoded.get(last_block_start(decoded, 3)..)?;

    // Round-trip encode the decoded block
    let mut buf = [0u8; 4];
    let bytes = encode_last(dec_block, &mut buf, alphabet);

    // Non-short-circuiting comparison
    if bytes
        .iter()
        .zip(enc_block.iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
    {
        Some(())
    } else {
        None
    }
}

/// Get the length of the output from decoding the provided *unpadded*
/// base64-encoded input.
///
/// Note that this function does not fully validate the base64 is well-formed
/// and may return incorrect results for malformed base64.
#[inline(always)]
fn decoded_len(input_len: usize) -> usize {
    // overflow-proof computation of `(3*n)/4`
    let k = input_len / 4;
    let l = input_len - 4 * k;
    3 * k + (3 * l) / 4
}

/// Decode 3 bytes of a base64 message.
#[inline(always)]
fn decode_3bytes(src: &[u8; 4], dst: &mut [u8; 3], alphabet: Alphabet) -> i16 {
    let c0 = decode_6bits(src[0], alphabet);
    let c1 = decode_6bits(src[1], alphabet);
    let c2 = decode_6bits(src[2], alphabet);
    let c3 = decode_6bits(src[3], alphabet);

    dst[0] = ((c0 << 2) | (c1 >> 4)) as u8;
    dst[1] = ((c1 << 4) | (c2 >> 2)) as u8;
    dst[2] = ((c2 << 6) | c3) as u8;

    ((c0 | c1 | c2 | c3) >> 8) & 1
}

/// Decode 6-bits of a base64 message.
fn decode_6bits(src: u8, alphabet: Alphabet) -> i16 {
    let mut ret: i16 = -1;

    ret += ((((b'A' as i16 - 1) - src as i16) & (src as i16 - (b'Z' as i16 + 1))) >> 8)
        & (src as i16 + -64);

    ret += ((((b'a' as i16 - 1) - src as i16) & (src as i16 - (b'z' as i16 + 1))) >> 8)
        & (src as i16 + -70);

    ret += ((((b'0' as i16 - 1) - src as i16) & (src as i16 - (b'9' as i16 + 1))) >> 8)
        & (src as i16 + 5);

    let (c62, c63) = match alphabet {
        Alphabet::UrlSafe => (b'-' as i16, b'_' as i16),
        Alphabet::Standard => (b'+' as i16, b'/' as i16),
    };

    ret += ((((c62 - 1) - src as i16) & (src as i16 - (c62 + 1))) >> 8) & 63;
    ret += ((((c63 - 1) - src as i16) & (src as i16 - (c63 + 1))) >> 8) & 64;

    ret
}

/// Encode 3-bytes of a base64 message.
#[inline(always)]
fn encode_3bytes(src: &[u8; 3], dst: &mut [u8; 4], alphabet: Alphabet) {
    let b0 = src[0] as i16;
    let b1 = src[1] as i16;
    let b2 = src[2] as i16;

    dst[0] = encode_6bits(b0 >> 2, alphabet);
    dst[1] = encode_6bits(((b0 << 4) | (b1 >> 4)) & 63, alphabet);
    dst[2] = encode_6bits(((b1 << 2) | (b2 >> 6)) & 63, alphabet);
    dst[3] = encode_6bits(b2 & 63, alphabet);
}

/// Encode 6-bits of a base64 message.
#[inline(always)]
fn encode_6bits(src: i16, alphabet: Alphabet) -> u8 {
    let mut diff = src + b'A' as i16;

    diff += ((25 - src) >> 8) & 6;
    diff += ((51 - src) >> 8) & -75;

    match alphabet {
        Alphabet::UrlSafe => {
            diff += ((61 - src) >> 8) & -(b'-' as i16 - 0x20);
            diff += ((62 - src) >> 8) & (b'_' as i16 - b'-' as i16 - 1);
        }
        Alphabet::Standard => {
            diff += ((61 - src) >> 8) & -(b'0' as i16 - b'+' as i16 + 10);
            diff += ((62 - src) >> 8) & (b'/' as i16 - b'+' as i16 - 1);
        }
    }

    diff as u8
}

#[cfg(test)]
mod tests {
    use super::{Alphabet, decode_vec, encode_string};

    const VECTORS: &[(&[u8], &str)] = &[
        (b"", ""),
        (b"f", "Zg"),
        (b"fo", "Zm8"),
        (b"foo", "Zm9v"),
        (b"foob", "Zm9vYg"),
        (b"fooba", "Zm9vYmE"),
        (b"foobar", "Zm9vYmFy"),
    ];

    #[test]
    fn rfc4648_vectors() {
        for (raw, encoded) in VECTORS {
            assert_eq!(encode_string(raw, Alphabet::UrlSafe), *encoded);
            assert_eq!(encode_string(raw, Alphabet::Standard), *encoded);
            assert_eq!(decode_vec(encoded, Alphabet::UrlSafe).unwrap(), *raw);
            assert_eq!(decode_vec(encoded, Alphabet::Standard).unwrap(), *raw);
        }
    }

    #[test]
    fn alphabets_diverge_on_62_and_63() {
        // 0xfb 0xff encodes the 6-bit groups 62, 63, 60
        assert_eq!(encode_string(&[0xfb, 0xff], Alphabet::UrlSafe), "-_8");
        assert_eq!(encode_string(&[0xfb, 0xff], Alphabet::Standard), "+/8");

        assert_eq!(decode_vec("-_8", Alphabet::UrlSafe).unwrap(), [0xfb, 0xff]);
        assert_eq!(decode_vec("+/8", Alphabet::Standard).unwrap(), [0xfb, 0xff]);

        assert!(decode_vec("-_8", Alphabet::Standard).is_none());
        assert!(decode_vec("+/8", Alphabet::UrlSafe).is_none());
    }

    #[test]
    fn rejects_padding_and_truncation() {
        assert!(decode_vec("Zg==", Alphabet::UrlSafe).is_none());
        assert!(decode_vec("Z", Alphabet::UrlSafe).is_none());
        assert!(decode_vec("Zm9v!", Alphabet::UrlSafe).is_none());
        assert!(decode_vec("Zm 9", Alphabet::UrlSafe).is_none());
    }

    #[test]
    fn rejects_non_canonical_final_block() {
        // "Zh" decodes to the same byte as "Zg" but does not round-trip
        assert!(decode_vec("Zh", Alphabet::UrlSafe).is_none());
        assert_eq!(decode_vec("Zg", Alphabet::UrlSafe).unwrap(), b"f");
    }

    #[test]
    fn round_trips_all_byte_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        for alphabet in [Alphabet::UrlSafe, Alphabet::Standard] {
            let encoded = encode_string(&bytes, alphabet);
            assert_eq!(decode_vec(&encoded, alphabet).unwrap(), bytes);
        }
    }
}
