//! Fact names and coercion of raw fact strings

/// Fact keys read while building a host record
pub mod keys {
    pub const BIOS_UUID: &str = "dmi::system::uuid";
    pub const VM_UUID: &str = "virt::uuid";
    pub const CPUS: &str = "cpu::cpu(s)";
    pub const SOCKETS: &str = "cpu::cpu_socket(s)";
    pub const CORES_PER_SOCKET: &str = "cpu::core(s)_per_socket";
    pub const MEMTOTAL: &str = "memory::memtotal";
    pub const BIOS_VENDOR: &str = "dmi::bios::vendor";
    pub const BIOS_VERSION: &str = "dmi::bios::version";
    /// Spelled the way subscription-manager reports it
    pub const BIOS_RELEASE_DATE: &str = "dmi::bios::relase_date";
    pub const CPU_FLAGS: &str = "lscpu::flags";
    pub const DISTRIBUTION_NAME: &str = "distribution::name";
    pub const DISTRIBUTION_VERSION: &str = "distribution::version";
    pub const DISTRIBUTION_ID: &str = "distribution::id";
    pub const KERNEL_RELEASE: &str = "uname::release";
    pub const IS_GUEST: &str = "virt::is_guest";
}

/// Parse the leading integer of a fact value
///
/// Leading whitespace and a sign are accepted, parsing stops at the first
/// non-digit. Missing or non-numeric values yield 0.
#[must_use]
pub fn to_int(value: Option<&str>) -> i64 {
    let Some(value) = value else {
        return 0;
    };
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let mut result: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        result = result
            .saturating_mul(10)
            .saturating_add(i64::from(digit - b'0'));
    }

    if negative { -result } else { result }
}

#[must_use]
pub fn kilobytes_to_bytes(kilobytes: i64) -> i64 {
    kilobytes.saturating_mul(1024)
}

/// Interpret a fact value as a boolean
///
/// Absent and empty values are false, as are exactly `0`, `f`, `F`,
/// `false`, `FALSE`, `off` and `OFF`. Everything else is true, including
/// mixed case spellings and values with surrounding whitespace.
#[must_use]
pub fn cast_boolean(value: Option<&str>) -> bool {
    const FALSE_VALUES: [&str; 8] = ["", "0", "f", "F", "false", "FALSE", "off", "OFF"];

    value.is_some_and(|v| !FALSE_VALUES.contains(&v))
}

/// `"<name> <version> (<codename>)"`, absent parts render as empty strings
#[must_use]
pub fn os_release(name: Option<&str>, version: Option<&str>, codename: Option<&str>) -> String {
    format!(
        "{} {} ({})",
        name.unwrap_or_default(),
        version.unwrap_or_default(),
        codename.unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int() {
        assert_eq!(to_int(Some("4")), 4);
        assert_eq!(to_int(Some(" 16 ")), 16);
        assert_eq!(to_int(Some("8 cores")), 8);
        assert_eq!(to_int(Some("-2")), -2);
        assert_eq!(to_int(Some("abc")), 0);
        assert_eq!(to_int(Some("")), 0);
        assert_eq!(to_int(None), 0);
    }

    #[test]
    fn test_kilobytes_to_bytes() {
        assert_eq!(kilobytes_to_bytes(to_int(Some("1"))), 1024);
        assert_eq!(kilobytes_to_bytes(0), 0);
    }

    #[test]
    fn test_cast_boolean() {
        for truthy in ["true", "True", "1", "yes", "t", "on", "False", "Off", " 0", "false\n"] {
            assert!(cast_boolean(Some(truthy)), "{truthy} should be true");
        }
        for falsy in ["false", "FALSE", "0", "f", "F", "off", "OFF", ""] {
            assert!(!cast_boolean(Some(falsy)), "{falsy} should be false");
        }
        assert!(!cast_boolean(None));
    }

    #[test]
    fn test_os_release() {
        assert_eq!(
            os_release(Some("Red Hat Test Linux"), Some("7.1"), Some("TestId")),
            "Red Hat Test Linux 7.1 (TestId)"
        );
        assert_eq!(os_release(Some("Fedora"), None, None), "Fedora  ()");
        assert_eq!(os_release(None, None, None), "  ()");
    }
}
