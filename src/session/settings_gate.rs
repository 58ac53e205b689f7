//! Tracks whether a download location is configured.

use crate::backend::AppSettings;
use crate::error::DownloaderError;

#[derive(Debug, Clone)]
pub struct SettingsGate {
    needs_config: bool,
    settings: Option<AppSettings>,
}

impl Default for SettingsGate {
    // Unconfigured until the first load says otherwise.
    fn default() -> Self {
        Self {
            needs_config: true,
            settings: None,
        }
    }
}

impl SettingsGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_config(&self) -> bool {
        self.needs_config
    }

    /// Last successfully loaded settings, if any.
    pub fn settings(&self) -> Option<&AppSettings> {
        self.settings.as_ref()
    }

    /// Fold the outcome of a `load_settings` call into the gate.
    pub fn observe(&mut self, loaded: &Result<AppSettings, DownloaderError>) {
        match loaded {
            Ok(settings) => {
                self.needs_config = !settings.is_configured();
                self.settings = Some(settings.clone());
            }
            Err(_) => {
                self.needs_config = true;
                self.settings = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_gated() {
        assert!(SettingsGate::new().needs_config());
    }

    #[test]
    fn test_loaded_settings_open_the_gate() {
        let mut gate = SettingsGate::new();
        gate.observe(&Ok(AppSettings::new("/home/me/Downloads")));
        assert!(!gate.needs_config());
        assert_eq!(gate.settings().map(|s| s.download_path.as_str()), Some("/home/me/Downloads"));
    }

    #[test]
    fn test_empty_path_keeps_gate_closed() {
        let mut gate = SettingsGate::new();
        gate.observe(&Ok(AppSettings::new("")));
        assert!(gate.needs_config());
    }

    #[test]
    fn test_load_failure_closes_gate_again() {
        let mut gate = SettingsGate::new();
        gate.observe(&Ok(AppSettings::new("/music")));
        gate.observe(&Err(DownloaderError::not_configured("settings.json does not exist")));
        assert!(gate.needs_config());
        assert!(gate.settings().is_none());
    }
}
