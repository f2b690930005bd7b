//! Declarative YAML suites of proxy connection checks

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::connection::VerificationKind;
use crate::error::{E2eError, E2eResult};

/// A suite of connection checks parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name, used as the report prefix
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Checks to run in order
    pub checks: Vec<ProxyCheck>,
}

/// One proxy product whose sample code is executed and verified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCheck {
    /// Unique key, also the case name in reports
    pub key: String,

    /// Display name of the proxy product
    pub name: String,

    /// Dashboard page the snippet was copied from
    #[serde(default)]
    pub url: String,

    /// How the response is judged
    pub verification: VerificationKind,

    /// Snippet sits behind the dashboard's Premium tab
    #[serde(default)]
    pub premium_tab_required: bool,

    /// Append `-v` to curl so the CONNECT exchange shows up on stderr
    #[serde(default)]
    pub add_verbose_flag: bool,

    /// Tags for filtering checks
    #[serde(default)]
    pub tags: Vec<String>,

    /// Sample code copied from the page
    #[serde(default)]
    pub snippet: String,
}

impl ProxyCheck {
    /// Case description shown in reports
    pub fn description(&self) -> String {
        let mut description = format!("{} ({} verification)", self.name, self.verification);
        if self.premium_tab_required {
            description.push_str(", Premium tab");
        }
        if !self.url.is_empty() {
            description.push_str(&format!(" - {}", self.url));
        }
        description
    }
}

/// Checks picked by [`SuiteConfig::select`] plus requested keys that matched nothing
#[derive(Debug)]
pub struct Selection<'a> {
    pub checks: Vec<&'a ProxyCheck>,
    pub unknown_keys: Vec<String>,
}

impl SuiteConfig {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all suites from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    /// Load a single file, or merge every suite found under a directory
    pub fn load(path: &Path) -> E2eResult<Self> {
        if !path.is_dir() {
            return Self::from_file(path);
        }

        let suites = Self::load_all(path)?;
        if suites.is_empty() {
            return Err(E2eError::SuiteParse(format!(
                "No suite files found in {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "suite".to_string());
        let merged = Self {
            name,
            description: suites
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            checks: suites.into_iter().flat_map(|s| s.checks).collect(),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Pick checks by key and tag; an empty `only` keeps every key
    pub fn select<'a>(&'a self, only: &[String], tag: Option<&str>) -> Selection<'a> {
        let checks = self
            .checks
            .iter()
            .filter(|c| only.is_empty() || only.contains(&c.key))
            .filter(|c| tag.map_or(true, |t| c.tags.iter().any(|ct| ct == t)))
            .collect();
        let unknown_keys = only
            .iter()
            .filter(|key| !self.checks.iter().any(|c| &c.key == *key))
            .cloned()
            .collect();
        Selection {
            checks,
            unknown_keys,
        }
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.key.trim().is_empty() {
                return Err(E2eError::SuiteParse(format!(
                    "Check '{}' has an empty key",
                    check.name
                )));
            }
            if !seen.insert(check.key.as_str()) {
                return Err(E2eError::SuiteParse(format!(
                    "Duplicate check key: {}",
                    check.key
                )));
            }
        }
        Ok(())
    }
}
