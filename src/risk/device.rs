//! Coarse device signature derived from a user-agent string.
//!
//! The signature is `"<browser> on <os>"`. It is deliberately coarse: browser
//! upgrades must not look like a new device.

pub const UNKNOWN_BROWSER: &str = "Unknown Browser";
pub const UNKNOWN_OS: &str = "Unknown OS";

/// Reduce a user-agent to a device signature such as `"Chrome on Windows"`.
#[must_use]
pub fn signature(user_agent: &str) -> String {
    format!("{} on {}", browser(user_agent), os(user_agent))
}

// Order matters: Chromium derivatives also advertise "Chrome" and "Safari".
fn browser(ua: &str) -> &'static str {
    if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("SamsungBrowser") {
        "Samsung Internet"
    } else if ua.contains("Opera") || ua.contains("OPR") {
        "Opera"
    } else if ua.contains("Trident") {
        "Internet Explorer"
    } else if ua.contains("Edge") || ua.contains("Edg/") {
        "Edge"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Safari") {
        "Safari"
    } else {
        UNKNOWN_BROWSER
    }
}

// iOS agents contain "like Mac OS X", Android agents contain "Linux" and
// Apple system agents contain "Darwin".
fn os(ua: &str) -> &'static str {
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Mac") {
        "MacOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        UNKNOWN_OS
    }
}
