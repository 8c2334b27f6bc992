use anyhow::{anyhow, Context};
use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::transport::ServiceTarget;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "prisma-data.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    /// Cluster base URL, e.g. `http://localhost:4466`.
    pub endpoint: String,
    pub service: String,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Name of the environment variable holding the service token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    /// Default datamodel used to validate imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datamodel: Option<String>,
}

impl Environment {
    pub fn token(&self) -> anyhow::Result<Option<String>> {
        match &self.token_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("Env var '{}' not set", var)),
            None => Ok(None),
        }
    }

    pub fn target(&self) -> anyhow::Result<ServiceTarget> {
        Ok(ServiceTarget {
            token: self.token()?,
            workspace: self.workspace.clone(),
            ..ServiceTarget::new(self.service.as_str(), self.stage.as_str())
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub environments: HashMap<String, Environment>,
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// `--config` wins, then `./prisma-data.toml`, then the user config dir.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("prisma-data").join("config.toml"))
            .filter(|path| path.exists())
            .unwrap_or(local)
    }

    /// Load configuration from the located config file
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = Self::locate(explicit);
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read {}; please run `prisma-data configure` first.",
                path.display()
            )
        })?;
        let mut cfg: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        cfg.path = path;
        Ok(cfg)
    }

    /// Save configuration back to the file it was loaded from
    pub fn save(&self) -> anyhow::Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Interactive setup for environments
    pub fn configure(explicit: Option<&Path>) -> anyhow::Result<()> {
        let theme = ColorfulTheme::default();
        let path = Self::locate(explicit);
        let mut cfg = if path.exists() {
            Config::load(Some(path.as_path())).unwrap_or_default()
        } else {
            Config::default()
        };
        cfg.path = path;

        loop {
            println!("🔧 Add or update an environment");
            let env_name: String = Input::with_theme(&theme)
                .with_prompt("Environment name (e.g., dev, prod)")
                .interact_text()?;

            let endpoint: String = Input::with_theme(&theme)
                .with_prompt(format!("Cluster endpoint for '{}'", env_name))
                .default("http://localhost:4466".into())
                .interact_text()?;

            let service: String = Input::with_theme(&theme)
                .with_prompt(format!("Service name for '{}'", env_name))
                .default("default".into())
                .interact_text()?;

            let stage: String = Input::with_theme(&theme)
                .with_prompt(format!("Stage for '{}'", env_name))
                .default("default".into())
                .interact_text()?;

            let workspace: String = Input::with_theme(&theme)
                .with_prompt(format!("Workspace for '{}' (empty for none)", env_name))
                .allow_empty(true)
                .interact_text()?;

            let token_env: String = Input::with_theme(&theme)
                .with_prompt(format!("Name of ENV var for the token of '{}' (empty for none)", env_name))
                .allow_empty(true)
                .interact_text()?;

            let datamodel: String = Input::with_theme(&theme)
                .with_prompt(format!("Datamodel file for '{}' (empty for none)", env_name))
                .allow_empty(true)
                .interact_text()?;

            cfg.environments.insert(
                env_name.clone(),
                Environment {
                    endpoint,
                    service,
                    stage,
                    workspace: non_empty(workspace),
                    token_env: non_empty(token_env),
                    datamodel: non_empty(datamodel),
                },
            );
            println!("✅ Environment '{}' configured", env_name);

            let again = Confirm::with_theme(&theme)
                .with_prompt("Add or update another environment?")
                .default(false)
                .interact()?;
            if !again {
                break;
            }
        }

        cfg.save()?;
        println!("✅ Configuration saved to {}", cfg.path.display());
        Ok(())
    }

    /// Retrieve a configured environment or error
    pub fn get_env(&self, name: &str) -> anyhow::Result<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| anyhow!("Environment '{}' not found in {}", name, self.path.display()))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
