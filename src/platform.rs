//! Platform capability detection for embedded playback.

use log::debug;

use crate::config::MutedAutoplayPolicy;

/// Capability flags resolved once when a setlist is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformCapabilities {
    /// Autoplay is only permitted when playback starts muted.
    pub requires_muted_autoplay: bool,
}

impl PlatformCapabilities {
    /// Detects capabilities from a browser user-agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let requires_muted_autoplay = ["iPhone", "iPad", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
            // iPadOS reports a desktop user agent but keeps the mobile token.
            || (user_agent.contains("Macintosh") && user_agent.contains("Mobile/"));
        Self {
            requires_muted_autoplay,
        }
    }

    /// Applies the configured policy, consulting `user_agent` only for `Auto`.
    pub fn resolve(policy: MutedAutoplayPolicy, user_agent: Option<&str>) -> Self {
        let capabilities = match policy {
            MutedAutoplayPolicy::Always => Self {
                requires_muted_autoplay: true,
            },
            MutedAutoplayPolicy::Never => Self {
                requires_muted_autoplay: false,
            },
            MutedAutoplayPolicy::Auto => user_agent
                .map(Self::from_user_agent)
                .unwrap_or_default(),
        };
        debug!(
            "Platform: policy={:?} requires_muted_autoplay={}",
            policy, capabilities.requires_muted_autoplay
        );
        capabilities
    }
}
