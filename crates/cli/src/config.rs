//! Demo CLI configuration: a small, serde-deserializable settings struct in
//! the same builder style as the rest of the workspace's config types, for
//! defaults that would otherwise have to be repeated on every invocation.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Goal to resolve when `--goal` is not given on the command line.
    #[serde(default)]
    pub default_goal: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is
    /// unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "dres=info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            default_goal: None,
            log_filter: default_log_filter(),
        }
    }
}

impl CliConfig {
    pub fn new() -> Self {
        CliConfig::default()
    }

    pub fn with_default_goal(mut self, goal: impl Into<String>) -> Self {
        self.default_goal = Some(goal.into());
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_the_file_sets_nothing() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config.default_goal, None);
        assert_eq!(config.log_filter, "dres=info");
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = CliConfig::new()
            .with_default_goal("deploy")
            .with_log_filter("dres=debug");
        assert_eq!(config.default_goal, Some("deploy".to_string()));
        assert_eq!(config.log_filter, "dres=debug");
    }

    #[test]
    fn parses_an_explicit_file() {
        let toml = "default_goal = \"deploy\"\nlog_filter = \"dres=trace\"\n";
        let config = CliConfig::from_toml(toml).unwrap();
        assert_eq!(config.default_goal, Some("deploy".to_string()));
        assert_eq!(config.log_filter, "dres=trace");
    }
}
