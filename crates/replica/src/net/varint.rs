/// Zigzag-encoded i32 takes at most five 7-bit groups.
pub const MAX_VARINT_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    #[error("varint is truncated")]
    Truncated,
    #[error("varint does not fit in 32 bits")]
    Overflow,
}

#[inline]
fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    let mut remaining = zigzag(value);
    while remaining >= 0x80 {
        out.push((remaining as u8) | 0x80);
        remaining >>= 7;
    }
    out.push(remaining as u8);
}

/// Returns the value and the number of bytes consumed.
pub fn read_i32(bytes: &[u8]) -> Result<(i32, usize), VarIntError> {
    let mut value: u64 = 0;
    for (index, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            let value = u32::try_from(value).map_err(|_| VarIntError::Overflow)?;
            return Ok((unzigzag(value), index + 1));
        }
    }

    if bytes.len() >= MAX_VARINT_LEN {
        Err(VarIntError::Overflow)
    } else {
        Err(VarIntError::Truncated)
    }
}

pub fn encoded_len(value: i32) -> usize {
    let bits = 32 - zigzag(value).leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: i32) -> Vec<u8> {
        let mut out = Vec::new();
        write_i32(&mut out, value);
        out
    }

    #[test]
    fn sign_survives_zigzag() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(-1), [0x01]);
        assert_eq!(encode(1), [0x02]);
        assert_eq!(encode(-64), [0x7f]);
        assert_eq!(encode(64), [0x80, 0x01]);

        for value in [0, 1, -1, 300, -300, 1300, -1301, i32::MAX, i32::MIN] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), encoded_len(value));
            assert_eq!(read_i32(&bytes), Ok((value, bytes.len())));
        }
    }

    #[test]
    fn trailing_data_is_not_consumed() {
        let mut bytes = encode(-20);
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        assert_eq!(read_i32(&bytes), Ok((-20, 1)));
    }

    #[test]
    fn malformed_prefixes() {
        assert_eq!(read_i32(&[]), Err(VarIntError::Truncated));
        assert_eq!(read_i32(&[0x80, 0x80]), Err(VarIntError::Truncated));
        assert_eq!(
            read_i32(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
            Err(VarIntError::Overflow)
        );
        assert_eq!(
            read_i32(&[0xff, 0xff, 0xff, 0xff, 0x7f]),
            Err(VarIntError::Overflow)
        );
    }
}
