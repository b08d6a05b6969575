//! Validation of JSON number literals

fn skip_digits(bytes: &[u8]) -> (&[u8], usize) {
    let count = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    (&bytes[count..], count)
}

/// Checks whether a string is a valid JSON number
///
/// The JSON grammar permits `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`;
/// notably it forbids leading zeros, a leading `+`, `NaN` and `Infinity`.
pub(crate) fn is_valid_json_number(value: &str) -> bool {
    let mut bytes = value.as_bytes();
    if let [b'-', rest @ ..] = bytes {
        bytes = rest;
    }

    match bytes {
        // A leading 0 must not be followed by further digits
        [b'0', rest @ ..] => bytes = rest,
        [b'1'..=b'9', ..] => (bytes, _) = skip_digits(bytes),
        _ => return false,
    }

    if let [b'.', rest @ ..] = bytes {
        let digits;
        (bytes, digits) = skip_digits(rest);
        if digits == 0 {
            return false;
        }
    }

    if let [b'e' | b'E', rest @ ..] = bytes {
        bytes = rest;
        if let [b'+' | b'-', rest @ ..] = bytes {
            bytes = rest;
        }
        let digits;
        (bytes, digits) = skip_digits(bytes);
        if digits == 0 {
            return false;
        }
    }

    bytes.is_empty()
}
