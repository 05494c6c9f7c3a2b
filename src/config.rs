use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PROJECT_PLACEHOLDER: &str = "{project}";

pub const DEFAULT_WORK_ITEM_URL: &str = "https://dev.azure.com/{project}/_apis/wit/workItems";
pub const DEFAULT_QUERY_URL: &str = "https://dev.azure.com/{project}/_apis/wit/wiql";
pub const DEFAULT_API_VERSION: &str = "7.1-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TASK_LIMIT: usize = 1;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSettings {
    pub work_item_url: String,
    pub query_url: String,
    pub work_item_api_version: String,
    pub query_api_version: String,
    pub timeout_secs: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            work_item_url: DEFAULT_WORK_ITEM_URL.into(),
            query_url: DEFAULT_QUERY_URL.into(),
            work_item_api_version: DEFAULT_API_VERSION.into(),
            query_api_version: DEFAULT_API_VERSION.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    pub task_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            task_limit: DEFAULT_TASK_LIMIT,
        }
    }
}

/// Resolved endpoints for one organization/project. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub project_path: String,
    pub work_item_url: String,
    pub query_url: String,
    pub work_item_api_version: String,
    pub query_api_version: String,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(settings: &EndpointSettings, project_path: &str) -> Result<Self> {
        let project_path = project_path.trim_matches('/');
        if project_path.is_empty() {
            bail!("Project path cannot be empty. Expected \"<organization>/<project>\"");
        }
        for template in [&settings.work_item_url, &settings.query_url] {
            if !template.contains(PROJECT_PLACEHOLDER) {
                bail!("URL template '{template}' has no {PROJECT_PLACEHOLDER} placeholder");
            }
        }

        let encoded = encode_project_path(project_path);
        Ok(Self {
            project_path: project_path.to_string(),
            work_item_url: expand(&settings.work_item_url, &encoded),
            query_url: expand(&settings.query_url, &encoded),
            work_item_api_version: settings.work_item_api_version.clone(),
            query_api_version: settings.query_api_version.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    pub fn work_item(&self, id: u64) -> String {
        format!("{}/{id}", self.work_item_url)
    }
}

fn expand(template: &str, encoded_project: &str) -> String {
    template
        .replace(PROJECT_PLACEHOLDER, encoded_project)
        .trim_end_matches('/')
        .to_string()
}

fn encode_project_path(project_path: &str) -> String {
    project_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("work-report").join("config.toml"))
}

/// Load settings from `explicit`, or from the default location if present.
/// An explicit path that does not exist is an error; a missing default file
/// yields built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };
    read_config(&path)
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn endpoints_expand_project_path() {
        let cfg = EndpointConfig::new(&EndpointSettings::default(), "contoso/backend").unwrap();
        assert_eq!(
            cfg.work_item_url,
            "https://dev.azure.com/contoso/backend/_apis/wit/workItems"
        );
        assert_eq!(cfg.query_url, "https://dev.azure.com/contoso/backend/_apis/wit/wiql");
        assert_eq!(
            cfg.work_item(4242),
            "https://dev.azure.com/contoso/backend/_apis/wit/workItems/4242"
        );
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn project_segments_are_percent_encoded() {
        let cfg = EndpointConfig::new(&EndpointSettings::default(), "/contoso/Fabrikam Fiber/").unwrap();
        assert_eq!(cfg.project_path, "contoso/Fabrikam Fiber");
        assert_eq!(
            cfg.query_url,
            "https://dev.azure.com/contoso/Fabrikam%20Fiber/_apis/wit/wiql"
        );
    }

    #[test]
    fn empty_project_path_rejected() {
        assert!(EndpointConfig::new(&EndpointSettings::default(), "/").is_err());
    }

    #[test]
    fn template_without_placeholder_rejected() {
        let settings = EndpointSettings {
            query_url: "https://dev.azure.com/_apis/wit/wiql".into(),
            ..EndpointSettings::default()
        };
        let err = EndpointConfig::new(&settings, "contoso/backend").unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn load_partial_config_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[endpoint]\nwork_item_url = \"https://tfs.local/{{project}}/_apis/wit/workitems/\"\ntimeout_secs = 3\n\n[search]\ntask_limit = 5"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.search.task_limit, 5);
        assert_eq!(config.endpoint.timeout_secs, 3);
        assert_eq!(config.endpoint.query_url, DEFAULT_QUERY_URL);
        assert_eq!(config.endpoint.work_item_api_version, DEFAULT_API_VERSION);

        let cfg = EndpointConfig::new(&config.endpoint, "org/proj").unwrap();
        assert_eq!(cfg.work_item(1), "https://tfs.local/org/proj/_apis/wit/workitems/1");
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = load_config(Some(missing.as_path()));
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nlimit = 2").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }
}
