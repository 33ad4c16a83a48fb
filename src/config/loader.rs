use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use tracing::debug;

use crate::config::AppConfig;

const CONFIG_DIR: &str = "craws";
const CONFIG_FILE: &str = "config.toml";

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Load the user's config file, falling back to defaults when there is none.
pub fn load() -> color_eyre::Result<AppConfig> {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            debug!("No config directory found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_from(path: &Path) -> color_eyre::Result<AppConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::config::{KeyResolver, NavAction, PickerAction};

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_from(&temp.path().join("missing.toml")).unwrap();

        assert_eq!(config.theme.name, "Catppuccin Mocha");
        assert_eq!(config.catalog.aws_command, "aws");
        assert_eq!(config.catalog.page_size, 50);
        assert_eq!(config.picker.lookahead, 20);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[catalog]\nmodels_dir = \"/opt/models\"\nprofile = \"dev\"\n\n\
             [keybindings.picker]\ncancel = \"ctrl+g\"\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.catalog.models_dir, Some(PathBuf::from("/opt/models")));
        assert_eq!(config.catalog.profile.as_deref(), Some("dev"));
        assert_eq!(config.catalog.page_size, 50);

        let resolver = KeyResolver::new(std::sync::Arc::new(config.keybindings));
        let ctrl_g = KeyEvent::new(KeyCode::Char('g'), KeyModifiers::CONTROL);
        assert!(resolver.matches_picker(&ctrl_g, PickerAction::Cancel));
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert!(!resolver.matches_picker(&esc, PickerAction::Cancel));
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        assert!(resolver.matches_nav(&down, NavAction::Down));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[picker]\nlookahead = \"lots\"\n").unwrap();

        assert!(load_from(&path).is_err());
    }
}
