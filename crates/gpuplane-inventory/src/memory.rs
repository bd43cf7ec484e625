//! Memory-size parsing for device labels and feature attributes.

const MIB_PER_GIB: u64 = 1024;
const MIB_PER_TIB: u64 = 1_048_576;

/// Parse a memory size into MiB.
///
/// Accepts `"<n>[.<frac>] <MiB|GiB|TiB>"`; anything else falls back to the
/// leading decimal digits interpreted as MiB. Overflow yields 0.
pub fn parse_memory_mib(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let mut parts = trimmed.split_whitespace();
    if let (Some(number), Some(unit), None) = (parts.next(), parts.next(), parts.next()) {
        if let Some(mib) = parse_with_unit(number, unit) {
            return mib;
        }
    }
    leading_digits(trimmed)
}

fn parse_with_unit(number: &str, unit: &str) -> Option<u64> {
    let multiplier = match unit {
        "MiB" => 1,
        "GiB" => MIB_PER_GIB,
        "TiB" => MIB_PER_TIB,
        _ => return None,
    };
    let (whole, frac) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    let whole: u64 = whole.parse().ok()?;
    let mut mib = whole.checked_mul(multiplier)?;
    if !frac.is_empty() {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let denom = 10u64.checked_pow(frac.len() as u32)?;
        let frac: u64 = frac.parse().ok()?;
        mib = mib.checked_add(frac.checked_mul(multiplier)? / denom)?;
    }
    Some(mib)
}

fn leading_digits(s: &str) -> u64 {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
