/// Milliseconds in one unit of `s`, `m`, `h` or `d`.
fn unit_millis(unit: char) -> Option<u128> {
    Some(match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        _ => return None,
    })
}

/// Parses durations such as `45s` or `1h30m` into milliseconds.
///
/// Every number needs a unit. Returns `None` on malformed input or overflow;
/// an empty string is zero.
///
/// ```
/// use titledb_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(90_000));
/// ```
pub fn parse_duration(input: &str) -> Option<u128> {
    let mut total = 0u128;
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u128 = rest[..digits].parse().ok()?;

        let mut tail = rest[digits..].chars();
        let millis = unit_millis(tail.next()?)?;
        total = total.checked_add(value.checked_mul(millis)?)?;
        rest = tail.as_str();
    }

    Some(total)
}
