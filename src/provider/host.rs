// src/provider/host.rs

//! The IntelliSense host, as consumed by the configuration provider.
//!
//! The host API evolved over several versions, so rather than branching on
//! version numbers throughout the flag parsing code, the negotiated version
//! is resolved once into a [`HostCapabilities`] struct at registration time
//! and threaded through from there.

/// Version of the host's custom-configuration API.
pub type ApiVersion = u32;

/// Oldest host API version this provider can talk to.
pub const MIN_API_VERSION: ApiVersion = 2;

/// Newest host API version this provider knows about.
pub const LATEST_API_VERSION: ApiVersion = 6;

/// What a given host API version supports, resolved once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub version: ApiVersion,
    /// Older hosts need an explicit language standard per file; newer ones
    /// deduce it themselves and the hint must be omitted.
    pub requires_standard_hint: bool,
    /// Whether `gnu*` dialect names are accepted, or must be demoted to
    /// their ISO equivalents.
    pub supports_gnu_standards: bool,
    pub supports_cpp23: bool,
    /// Older hosts need an explicit IntelliSense mode; newer ones only want
    /// it when the flags actually pin an architecture.
    pub requires_architecture_hint: bool,
    pub supports_notify_ready: bool,
}

impl HostCapabilities {
    pub fn from_version(version: ApiVersion) -> Self {
        Self {
            version,
            requires_standard_hint: version < 5,
            supports_gnu_standards: version >= 4,
            supports_cpp23: version >= 6,
            requires_architecture_hint: version < 5,
            supports_notify_ready: version >= 2,
        }
    }

    pub fn latest() -> Self {
        Self::from_version(LATEST_API_VERSION)
    }
}

/// External IntelliSense host handle.
///
/// Production code wraps the real editor tooling; tests provide a recording
/// fake. The provider only ever calls these entry points.
pub trait IntellisenseHost: Send {
    fn version(&self) -> ApiVersion;

    /// Signal that the provider is registered and ready to serve requests.
    /// Only called when the negotiated version supports it.
    fn notify_ready(&mut self);

    fn did_change_custom_configuration(&mut self);

    fn did_change_custom_browse_configuration(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_thresholds() {
        let v2 = HostCapabilities::from_version(2);
        assert!(v2.requires_standard_hint);
        assert!(!v2.supports_gnu_standards);
        assert!(v2.supports_notify_ready);

        let v4 = HostCapabilities::from_version(4);
        assert!(v4.requires_standard_hint);
        assert!(v4.supports_gnu_standards);
        assert!(!v4.supports_cpp23);

        let v5 = HostCapabilities::from_version(5);
        assert!(!v5.requires_standard_hint);
        assert!(!v5.requires_architecture_hint);

        assert!(HostCapabilities::latest().supports_cpp23);
    }
}
