use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use std::{
    env, fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::args::BaseArgs;
use crate::remote::ArtifactFormat;
use crate::ui::{print_command_status, CommandStatus};

mod get;
mod list;
mod set;

pub const DEFAULT_API_URL: &str = "https://connectapi.garmin.com";
pub const DEFAULT_AUTH_URL: &str = "https://sso.garmin.com/fitsync";
pub const DEFAULT_TOKENSTORE: &str = "~/.garminconnect";
pub const DEFAULT_TOKENSTORE_BASE64: &str = "~/.garminconnect_base64";
pub const DEFAULT_EXPORT_DIR: &str = "data";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 200;
pub const DEFAULT_HR_THRESHOLD: u32 = 160;

/// Contents of the config file. Every field is optional; unset fields fall
/// back to flags, environment, then built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub auth_url: Option<String>,
    pub tokenstore: Option<String>,
    pub tokenstore_base64: Option<String>,
    pub export_dir: Option<String>,
    pub page_size: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub format: Option<ArtifactFormat>,
    pub hr_threshold: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub const KNOWN_KEYS: &[&str] = &[
    "api_url",
    "auth_url",
    "tokenstore",
    "tokenstore_base64",
    "export_dir",
    "page_size",
    "request_delay_ms",
    "format",
    "hr_threshold",
];

impl Config {
    pub fn get_field(&self, key: &str) -> Option<String> {
        match key {
            "api_url" => self.api_url.clone(),
            "auth_url" => self.auth_url.clone(),
            "tokenstore" => self.tokenstore.clone(),
            "tokenstore_base64" => self.tokenstore_base64.clone(),
            "export_dir" => self.export_dir.clone(),
            "page_size" => self.page_size.map(|v| v.to_string()),
            "request_delay_ms" => self.request_delay_ms.map(|v| v.to_string()),
            "format" => self.format.map(|v| v.to_string()),
            "hr_threshold" => self.hr_threshold.map(|v| v.to_string()),
            _ => None,
        }
    }

    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_url" => self.api_url = Some(value.to_string()),
            "auth_url" => self.auth_url = Some(value.to_string()),
            "tokenstore" => self.tokenstore = Some(value.to_string()),
            "tokenstore_base64" => self.tokenstore_base64 = Some(value.to_string()),
            "export_dir" => self.export_dir = Some(value.to_string()),
            "page_size" => {
                let size: usize = value
                    .parse()
                    .with_context(|| format!("page_size must be a positive integer, got {value}"))?;
                if size == 0 {
                    bail!("page_size must be greater than zero");
                }
                self.page_size = Some(size);
            }
            "request_delay_ms" => {
                self.request_delay_ms = Some(value.parse().with_context(|| {
                    format!("request_delay_ms must be an integer, got {value}")
                })?)
            }
            "format" => {
                let format = <ArtifactFormat as clap::ValueEnum>::from_str(value, true)
                    .map_err(|_| anyhow!("unknown format: {value}"))?;
                self.format = Some(format);
            }
            "hr_threshold" => {
                self.hr_threshold = Some(value.parse().with_context(|| {
                    format!("hr_threshold must be an integer, got {value}")
                })?)
            }
            _ => bail!("unknown config key: {key}"),
        }
        Ok(())
    }

    pub fn unset_field(&mut self, key: &str) -> bool {
        match key {
            "api_url" => self.api_url = None,
            "auth_url" => self.auth_url = None,
            "tokenstore" => self.tokenstore = None,
            "tokenstore_base64" => self.tokenstore_base64 = None,
            "export_dir" => self.export_dir = None,
            "page_size" => self.page_size = None,
            "request_delay_ms" => self.request_delay_ms = None,
            "format" => self.format = None,
            "hr_threshold" => self.hr_threshold = None,
            _ => return false,
        }
        true
    }

    pub fn non_empty_fields(&self) -> Vec<(&'static str, String)> {
        KNOWN_KEYS
            .iter()
            .filter_map(|&key| self.get_field(key).map(|v| (key, v)))
            .collect()
    }
}

/// Fully resolved configuration handed to every operation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub auth_url: String,
    pub tokenstore: PathBuf,
    pub tokenstore_base64: PathBuf,
    pub export_dir: PathBuf,
    pub page_size: usize,
    pub request_delay: Duration,
    pub format: ArtifactFormat,
    pub hr_threshold: u32,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Settings {
    pub fn resolve(base: &BaseArgs) -> Result<Settings> {
        let config = load_file(&config_path()?);
        Ok(Settings::from_layers(base, &config))
    }

    /// Flags and environment (already merged by clap) win over the file.
    pub fn from_layers(base: &BaseArgs, config: &Config) -> Settings {
        let pick = |flag: &Option<String>, file: &Option<String>, default: &str| {
            flag.clone()
                .or_else(|| file.clone())
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let export_dir = base.export_dir.clone().unwrap_or_else(|| {
            expand_tilde(config.export_dir.as_deref().unwrap_or(DEFAULT_EXPORT_DIR))
        });

        Settings {
            api_url: pick(&base.api_url, &config.api_url, DEFAULT_API_URL),
            auth_url: pick(&base.auth_url, &config.auth_url, DEFAULT_AUTH_URL),
            tokenstore: expand_tilde(&pick(
                &base.tokenstore,
                &config.tokenstore,
                DEFAULT_TOKENSTORE,
            )),
            tokenstore_base64: expand_tilde(&pick(
                &base.tokenstore_base64,
                &config.tokenstore_base64,
                DEFAULT_TOKENSTORE_BASE64,
            )),
            export_dir,
            page_size: config
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            request_delay: Duration::from_millis(
                config.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS),
            ),
            format: config.format.unwrap_or(ArtifactFormat::Fit),
            hr_threshold: config.hr_threshold.unwrap_or(DEFAULT_HR_THRESHOLD),
            email: base.email.clone().filter(|v| !v.trim().is_empty()),
            password: base.password.clone().filter(|v| !v.is_empty()),
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn global_config_dir() -> Result<PathBuf> {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("fitsync"));
    }
    dirs::home_dir()
        .map(|path| path.join(".config").join("fitsync"))
        .ok_or_else(|| anyhow!("$HOME not configured."))
}

pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("FITSYNC_CONFIG").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(global_config_dir()?.join("config.json"))
}

pub fn load_file(path: &Path) -> Config {
    let file_contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Config::default(),
        Err(e) => {
            print_command_status(
                CommandStatus::Warning,
                &format!("could not read {}: {e}", path.display()),
            );
            return Config::default();
        }
    };

    let config: Config = match serde_json::from_str(&file_contents) {
        Ok(c) => c,
        Err(e) => {
            print_command_status(
                CommandStatus::Warning,
                &format!("could not parse {}: {e}", path.display()),
            );
            return Config::default();
        }
    };

    for key in config.extra.keys() {
        print_command_status(
            CommandStatus::Warning,
            &format!("unknown config key {} in {}", key, path.display()),
        );
    }

    config
}

pub fn save_file(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

// --- CLI commands ---

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommands>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommands {
    /// List config values
    List {
        /// Include built-in defaults and effective values
        #[arg(long)]
        resolved: bool,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Value to set
        value: String,
    },
    /// Remove a config value
    Unset {
        /// Config key
        key: String,
    },
}

fn validate_key(key: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        bail!(
            "Unknown config key: {key}\nValid keys: {}",
            KNOWN_KEYS.join(", ")
        );
    }
    Ok(())
}

pub fn run(base: BaseArgs, args: ConfigArgs) -> Result<()> {
    let path = config_path()?;
    match args.command {
        None => list::run(&base, &path, false),
        Some(ConfigCommands::List { resolved }) => list::run(&base, &path, resolved),
        Some(ConfigCommands::Get { key }) => {
            validate_key(&key)?;
            get::run(&base, &path, &key)
        }
        Some(ConfigCommands::Set { key, value }) => {
            validate_key(&key)?;
            set::run(&path, &key, &value)
        }
        Some(ConfigCommands::Unset { key }) => {
            validate_key(&key)?;
            set::unset(&path, &key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_override_file_and_file_overrides_defaults() {
        let config = Config {
            api_url: Some("https://file.example".into()),
            auth_url: Some("https://auth.file.example".into()),
            page_size: Some(50),
            format: Some(ArtifactFormat::Tcx),
            ..Default::default()
        };
        let base = BaseArgs {
            api_url: Some("https://flag.example".into()),
            ..Default::default()
        };

        let settings = Settings::from_layers(&base, &config);
        assert_eq!(settings.api_url, "https://flag.example");
        assert_eq!(settings.auth_url, "https://auth.file.example");
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.format, ArtifactFormat::Tcx);
        assert_eq!(settings.hr_threshold, DEFAULT_HR_THRESHOLD);
        assert_eq!(settings.export_dir, PathBuf::from(DEFAULT_EXPORT_DIR));
        assert_eq!(
            settings.request_delay,
            Duration::from_millis(DEFAULT_REQUEST_DELAY_MS)
        );
    }

    #[test]
    fn zero_page_size_in_file_falls_back_to_default() {
        let config = Config {
            page_size: Some(0),
            ..Default::default()
        };
        let settings = Settings::from_layers(&BaseArgs::default(), &config);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn blank_credentials_are_ignored() {
        let base = BaseArgs {
            email: Some("  ".into()),
            password: Some(String::new()),
            ..Default::default()
        };
        let settings = Settings::from_layers(&base, &Config::default());
        assert!(settings.email.is_none());
        assert!(settings.password.is_none());
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde("~/.garminconnect"), home.join(".garminconnect"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("data"), PathBuf::from("data"));
        assert_eq!(expand_tilde("/abs/~/x"), PathBuf::from("/abs/~/x"));
    }

    #[test]
    fn set_field_validates_values() {
        let mut config = Config::default();
        config.set_field("page_size", "25").unwrap();
        config.set_field("format", "GPX").unwrap();
        config.set_field("request_delay_ms", "0").unwrap();
        assert_eq!(config.page_size, Some(25));
        assert_eq!(config.format, Some(ArtifactFormat::Gpx));
        assert_eq!(config.request_delay_ms, Some(0));

        assert!(config.set_field("page_size", "0").is_err());
        assert!(config.set_field("page_size", "many").is_err());
        assert!(config.set_field("format", "mp4").is_err());
        assert!(config.set_field("colour", "blue").is_err());
    }

    #[test]
    fn unset_field_clears_value() {
        let mut config = Config {
            hr_threshold: Some(150),
            ..Default::default()
        };
        assert!(config.unset_field("hr_threshold"));
        assert_eq!(config.hr_threshold, None);
        assert!(!config.unset_field("nope"));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_file(&tmp.path().join("nonexistent.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_invalid_json_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("invalid.json");
        fs::write(&path, "not valid json {{{").unwrap();
        assert_eq!(load_file(&path), Config::default());
    }

    #[test]
    fn save_load_roundtrip_keeps_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"export_dir": "runs", "format": "json", "unknown_field": "value"}"#,
        )
        .unwrap();

        let config = load_file(&path);
        assert_eq!(config.export_dir.as_deref(), Some("runs"));
        assert_eq!(config.format, Some(ArtifactFormat::Json));
        save_file(&path, &config).unwrap();

        let reloaded = load_file(&path);
        assert_eq!(reloaded, config);
        assert!(reloaded.extra.contains_key("unknown_field"));
    }

    #[test]
    fn non_empty_fields_follow_key_order() {
        let config = Config {
            page_size: Some(10),
            api_url: Some("https://a".into()),
            ..Default::default()
        };
        let fields = config.non_empty_fields();
        assert_eq!(
            fields,
            vec![("api_url", "https://a".to_string()), ("page_size", "10".to_string())]
        );
    }
}
