pub mod actions;
pub mod key;
pub mod keybindings;
pub mod loader;
pub mod resolver;

use std::path::PathBuf;

pub use actions::*;
use keybindings::KeybindingsConfig;
pub use loader::load;
pub use resolver::KeyResolver;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            name: "Catppuccin Mocha".to_string(),
        }
    }
}

/// Where service metadata comes from and how operations are invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Model directory; discovered from the AWS CLI or botocore when unset.
    pub models_dir: Option<PathBuf>,
    pub aws_command: String,
    /// Results requested per page.
    pub page_size: u32,
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            models_dir: None,
            aws_command: "aws".to_string(),
            page_size: 50,
            profile: None,
            region: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Rows pulled beyond the visible window.
    pub lookahead: usize,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self { lookahead: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub keybindings: KeybindingsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub picker: PickerConfig,
}
