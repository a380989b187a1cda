//! Host platform seam. Desktop builds need nothing special; ports that do
//! (Android, for one) supply their own plugin with the instance extensions
//! and lifecycle hooks the runtime loader wants there.

pub trait PlatformPlugin: Send {
    fn label(&self) -> &'static str;

    /// Runtime instance extensions the platform requires, by name.
    fn instance_extensions(&self) -> Vec<String>;
}

/// Plugin for platforms with no special requirements.
#[derive(Debug, Default)]
pub struct NullPlatform;

impl PlatformPlugin for NullPlatform {
    fn label(&self) -> &'static str {
        "Null Platform"
    }

    fn instance_extensions(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_platform_requests_no_extensions() {
        let platform = NullPlatform;
        assert!(platform.instance_extensions().is_empty());
        assert_eq!(platform.label(), "Null Platform");
    }
}
