use crate::{OutputMode, TranslationConfig, TranslationError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "rosetta.toml";
const ENV_PREFIX: &str = "ROSETTA";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Google,
    OpenAi,
    /// Leaves text untranslated; useful to check what a run would touch.
    Identity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub tone: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        OpenAiSettings {
            api_key: "".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.2,
            tone: "neutral".to_owned(),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input: PathBuf,
    #[serde(default)]
    pub output: OutputMode,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub openai: OpenAiSettings,
}

/// Loads `rosetta.toml` (or the file named by `ROSETTA_CONFIG`) overlaid with `ROSETTA_*` variables.
///
/// Nested keys are separated by `__`, lists by commas:
/// `ROSETTA_TRANSLATION__DST_LANG=ru`, `ROSETTA_TRANSLATION__SKIP_SUBSTRINGS=http://,@`.
pub fn load() -> Result<Settings, TranslationError> {
    let file = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

    let env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("translation.visible_attributes")
        .with_list_parse_key("translation.protected_tags")
        .with_list_parse_key("translation.skip_substrings")
        .try_parsing(true);

    load_from(&file, Some(env))
}

pub fn load_from(file: &Path, env: Option<Environment>) -> Result<Settings, TranslationError> {
    let mut builder = Config::builder().add_source(File::from(file).required(false));
    if let Some(env) = env {
        builder = builder.add_source(env);
    }

    let settings = builder
        .build()
        .and_then(|c| c.try_deserialize::<Settings>())
        .map_err(|e| TranslationError::ConfigError(e.to_string()))?;

    settings.translation.validate()?;
    if settings.backend == BackendKind::OpenAi && settings.openai.api_key.trim().is_empty() {
        return Err(TranslationError::ConfigError(
            "openai.api_key is required for the openai backend".to_owned(),
        ));
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Script;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_keys() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("rosetta.toml");
        fs::write(&file, r#"input = "site/index.html""#).unwrap();

        let settings = load_from(&file, None).unwrap();

        assert_eq!(settings.input, PathBuf::from("site/index.html"));
        assert_eq!(settings.output, OutputMode::InPlace);
        assert_eq!(settings.backend, BackendKind::Google);
        assert_eq!(settings.cache_path, None);
        assert_eq!(settings.translation.src_lang, "it");
        assert_eq!(settings.translation.dst_lang, "th");
        assert_eq!(settings.translation.batch_chunk_size, 40);
        assert_eq!(settings.translation.protected_tags, ["comment", "script", "style"]);
    }

    #[test]
    fn reads_nested_sections() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("rosetta.toml");
        fs::write(
            &file,
            r#"
input = "index.html"
output = { path = "out/index.html" }
backend = "identity"
cache_path = "cache.sqlite"

[translation]
src_lang = "auto"
dst_lang = "ru"
batch_chunk_size = 80
visible_attributes = ["alt", "title"]
source_script = "any"
skip_target_script = "cyrillic"
skip_substrings = ["http://", "https://", "www.", "@", "{", "}"]
"#,
        )
        .unwrap();

        let settings = load_from(&file, None).unwrap();

        assert_eq!(settings.output, OutputMode::Path("out/index.html".into()));
        assert_eq!(settings.backend, BackendKind::Identity);
        assert_eq!(settings.cache_path, Some(PathBuf::from("cache.sqlite")));
        assert_eq!(settings.translation.dst_lang, "ru");
        assert_eq!(settings.translation.batch_chunk_size, 80);
        assert_eq!(settings.translation.visible_attributes, ["alt", "title"]);
        assert_eq!(settings.translation.source_script, Script::Any);
        assert_eq!(settings.translation.skip_target_script, Some(Script::Cyrillic));
        assert_eq!(settings.translation.skip_substrings.len(), 6);
    }

    #[test]
    fn suffixed_output_mode() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("rosetta.toml");
        fs::write(&file, "input = \"index.html\"\noutput = \"suffixed\"\n").unwrap();

        assert_eq!(load_from(&file, None).unwrap().output, OutputMode::Suffixed);
    }

    #[test]
    fn missing_input_is_a_config_error() {
        let dir = tempdir().unwrap();

        let res = load_from(&dir.path().join("absent.toml"), None);

        assert!(matches!(res, Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("rosetta.toml");
        fs::write(&file, "input = \"a.html\"\n[translation]\nbatch_chunk_size = 0\n").unwrap();

        let res = load_from(&file, None);

        assert!(matches!(res, Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn openai_backend_needs_a_key() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("rosetta.toml");
        fs::write(&file, "input = \"a.html\"\nbackend = \"openai\"\n").unwrap();

        let res = load_from(&file, None);

        assert!(matches!(res, Err(TranslationError::ConfigError(_))));
    }
}
