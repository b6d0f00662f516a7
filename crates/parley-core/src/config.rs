use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_FETCH_LIMIT: usize = 25;
const DEFAULT_TYPING_DISPLAY_SECS: u64 = 5;
const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Tunables for the conversation core. Loaded from a JSON file when one
/// exists; absent or malformed files silently fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages per history page.
    pub fetch_limit: usize,
    /// How long a typing indicator stays visible without a newer event.
    pub typing_display_secs: u64,
    /// Entry count for the resource byte cache.
    pub cache_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            typing_display_secs: DEFAULT_TYPING_DISPLAY_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ChatConfig {
    pub fn load(path: &Path) -> Self {
        let Ok(bytes) = std::fs::read(path) else {
            return Self::default();
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    pub fn typing_display_duration(&self) -> Duration {
        Duration::from_secs(self.typing_display_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ChatConfig::default();
        assert_eq!(config.fetch_limit, 25);
        assert_eq!(config.typing_display_secs, 5);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.typing_display_duration(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::load(&dir.path().join("does_not_exist.json"));
        assert_eq!(config.fetch_limit, 25);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley_config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"fetch_limit": 50}"#).unwrap();

        let config = ChatConfig::load(&path);
        assert_eq!(config.fetch_limit, 50);
        assert_eq!(config.typing_display_secs, 5);
        assert_eq!(config.cache_capacity, 100);
    }

    #[test]
    fn malformed_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley_config.json");
        std::fs::write(&path, b"{not json").unwrap();

        let config = ChatConfig::load(&path);
        assert_eq!(config.fetch_limit, 25);
    }
}
