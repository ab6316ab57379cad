/// Base-255 variable-length integers.
///
/// Digits are stored least-significant first, one per byte, each in `0..=254`. Radix 255 keeps
/// every digit distinct from the historical 0xFF terminator and is part of the wire format.

use crate::error::{Result, TransferError};

/// Digit radix.
pub const RADIX: u128 = 255;

/// Number of digits `value` needs. Zero needs one digit.
pub fn digits_needed(value: u128) -> usize {
    let mut digits = 1;
    let mut rest = value / RADIX;
    while rest > 0 {
        digits += 1;
        rest /= RADIX;
    }
    digits
}

/// Largest value a `size`-byte slot can hold, or `None` if it exceeds `u128`.
pub fn max_value(size: usize) -> Option<u128> {
    let size = u32::try_from(size).ok()?;
    match RADIX.checked_pow(size) {
        Some(limit) => Some(limit - 1),
        // 255^16 still fits; anything wider than 16 digits covers the whole u128 range.
        None => Some(u128::MAX),
    }
}

/// Encode with the minimal digit count.
pub fn encode(value: u128) -> Vec<u8> {
    let mut out = vec![0u8; digits_needed(value)];
    write_digits(value, &mut out);
    out
}

/// Encode into exactly `size` bytes, zero padded. `size == 0` means minimal length.
///
/// Fails with `InvalidArgument` if the value needs more than `size` digits.
pub fn encode_fixed(value: u128, size: usize) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(encode(value));
    }
    let mut out = vec![0u8; size];
    encode_into(value, &mut out)?;
    Ok(out)
}

/// Encode into a caller-owned slot, zero padding the high digits.
///
/// The slot is left zeroed when the value does not fit.
pub fn encode_into(value: u128, slot: &mut [u8]) -> Result<()> {
    let rest = write_digits(value, slot);
    if rest != 0 {
        slot.fill(0);
        return Err(TransferError::InvalidArgument(format!(
            "{} does not fit in {} base-255 digits",
            value,
            slot.len()
        )));
    }
    Ok(())
}

/// Decode a digit sequence. Empty input is zero.
///
/// Any byte is accepted as a digit, including 255, which a conforming encoder never emits. The only
/// failure is a value too large for `u128`.
pub fn decode(bytes: &[u8]) -> Result<u128> {
    let mut value: u128 = 0;
    for &digit in bytes.iter().rev() {
        value = value
            .checked_mul(RADIX)
            .and_then(|v| v.checked_add(digit as u128))
            .ok_or_else(|| {
                TransferError::InvalidArgument(format!(
                    "{}-digit base-255 value overflows 128 bits",
                    bytes.len()
                ))
            })?;
    }
    Ok(value)
}

/// Write low digits of `value` into `out`, returning what did not fit.
fn write_digits(mut value: u128, out: &mut [u8]) -> u128 {
    for digit in out.iter_mut() {
        *digit = (value % RADIX) as u8;
        value /= RADIX;
    }
    value
}
