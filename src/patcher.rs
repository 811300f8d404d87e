use crate::settings::Settings;

/// Entry point for diffing, fuzzy matching and patching.
///
/// A `Patcher` carries only a [`Settings`] record and is cheap to create
/// and clone. It holds no interior state: every operation reads the
/// settings and works on the arguments it is given, so a single instance
/// can be reused across documents.
#[derive(Debug, Clone, Default)]
pub struct Patcher {
    pub(crate) settings: Settings,
}

impl Patcher {
    /// Create a patcher with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a patcher with explicit settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self { settings }
    }

    /// Get the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable access to the settings, for tuning between calls.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_settings_overrides_defaults() {
        let mut settings = Settings::default();
        settings.match_distance = 100;
        let patcher = Patcher::with_settings(settings);
        assert_eq!(patcher.settings().match_distance, 100);
    }

    #[test]
    fn settings_mut_tunes_in_place() {
        let mut patcher = Patcher::new();
        patcher.settings_mut().match_threshold = 0.25;
        assert_eq!(patcher.settings().match_threshold, 0.25);
    }
}
