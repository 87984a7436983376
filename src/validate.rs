//! Validation of user-supplied connection settings.
//!
//! Both predicates are total: malformed input yields `false`, never an error.
//! They accept exactly the same strings as the setup form of the control panel:
//!
//! - PLC IP: four dot-separated decimal octets in 0-255, no leading zeros
//!   (`0` alone is fine, `01` is not).
//! - Winch output word: `QW` followed by `1`-`9`, `01`-`09` or `10`-`99`.
//!
//! # Example
//!
//! ```
//! use winch_link::{validate_ip, validate_mem_address};
//!
//! assert!(validate_ip("192.168.0.1"));
//! assert!(!validate_ip("256.1.1.1"));
//!
//! assert!(validate_mem_address("QW4"));
//! assert!(!validate_mem_address("QW100"));
//! ```

/// Returns true iff `s` is a dotted-quad IPv4 literal.
pub fn validate_ip(s: &str) -> bool {
    let mut groups = 0;
    for octet in s.split('.') {
        groups += 1;
        if groups > 4 || !is_octet(octet) {
            return false;
        }
    }
    groups == 4
}

fn is_octet(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    s.parse::<u16>().map_or(false, |v| v <= 255)
}

/// Returns true iff `s` names a PLC output word in `QW1`..`QW99`.
///
/// The single-digit form may carry one leading zero (`QW01`..`QW09`);
/// `QW0` and `QW00` are rejected.
pub fn validate_mem_address(s: &str) -> bool {
    let Some(index) = s.strip_prefix("QW") else {
        return false;
    };
    match index.as_bytes() {
        [d] => (b'1'..=b'9').contains(d),
        [b'0', d] => (b'1'..=b'9').contains(d),
        [hi, lo] => (b'1'..=b'9').contains(hi) && lo.is_ascii_digit(),
        _ => false,
    }
}
