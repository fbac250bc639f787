//! Channel property flags.

use bitflags::bitflags;

bitflags! {
    /// Composable flags governing which channels a given build or test
    /// context activates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelProperties: u8 {
        /// No special behavior
        const NONE = 0;
        /// Part of the default channel set
        const DEFAULT = 1 << 0;
        /// Only active for internal builds
        const INTERNAL_ONLY = 1 << 1;
        /// Only active under test contexts
        const TEST = 1 << 2;
        /// Suppressed when running under a unit-test host
        const NOT_FOR_UNIT_TEST = 1 << 3;
        /// Development-time channel
        const DEV_CHANNEL = 1 << 4;
    }
}

impl Default for ChannelProperties {
    fn default() -> Self {
        ChannelProperties::DEFAULT
    }
}
