pub mod cache;
pub mod lang_tag;
pub mod protect;
pub mod reinsert;
pub mod segment;
pub mod settings;
pub mod translator;
mod utils;

use crate::cache::Cache;
use crate::segment::{PatternSegmenter, Script, Segmenter};
use crate::translator::{Translator, TranslatorBuilder};
use serde::Deserialize;
use std::ffi::OsString;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub src_lang: String,
    pub dst_lang: String,
    /// Attributes whose values are visible to the reader.
    pub visible_attributes: Vec<String>,
    /// `comment` or element names whose whole content is opaque.
    pub protected_tags: Vec<String>,
    pub batch_chunk_size: usize,
    /// Text without a letter of this script is left alone.
    pub source_script: Script,
    /// Text written entirely in this script is treated as already translated.
    pub skip_target_script: Option<Script>,
    pub skip_substrings: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig {
            src_lang: "it".to_owned(),
            dst_lang: "th".to_owned(),
            visible_attributes: [
                "alt",
                "title",
                "placeholder",
                "aria-label",
                "aria-placeholder",
                "data-title",
            ]
            .map(str::to_owned)
            .to_vec(),
            protected_tags: ["comment", "script", "style"].map(str::to_owned).to_vec(),
            batch_chunk_size: 40,
            source_script: Script::Latin,
            skip_target_script: None,
            skip_substrings: vec![],
        }
    }
}

impl TranslationConfig {
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.batch_chunk_size == 0 {
            return Err(TranslationError::ConfigError(
                "batch_chunk_size must be positive".to_owned(),
            ));
        }
        if self.src_lang.trim().is_empty() || self.dst_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError(
                "src_lang and dst_lang must be set".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Where the translated document goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    InPlace,
    /// `<stem>.<dst_lang><ext>` next to the input.
    Suffixed,
    Path(PathBuf),
}

impl OutputMode {
    pub fn resolve(&self, input: &Path, dst_lang: &str) -> PathBuf {
        match self {
            OutputMode::InPlace => input.to_owned(),
            OutputMode::Suffixed => {
                let mut name = input.file_stem().map(OsString::from).unwrap_or_default();
                name.push(format!(".{dst_lang}"));
                if let Some(ext) = input.extension() {
                    name.push(".");
                    name.push(ext);
                }
                input.with_file_name(name)
            }
            OutputMode::Path(path) => path.clone(),
        }
    }
}

pub fn backup_path(input: &Path, src_lang: &str) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(format!(".bak.{src_lang}.html"));
    PathBuf::from(name)
}

#[derive(Debug)]
pub enum BackendError {
    ConnectionError(anyhow::Error),
    ApiError(anyhow::Error),
    RateLimited(String),
    InteractionError(anyhow::Error),
    OtherError(anyhow::Error),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::ConnectionError(e) => write!(f, "Connection error: {}", e),
            BackendError::ApiError(e) => write!(f, "API error: {}", e),
            BackendError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            BackendError::InteractionError(e) => write!(f, "Unexpected response: {}", e),
            BackendError::OtherError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug)]
pub enum TranslationError {
    InputNotFound(PathBuf),
    ConfigError(String),
    IoError(std::io::Error),
    DatabaseError(rusqlite::Error),
    BackendError(BackendError),
    OtherError(anyhow::Error),
}

impl Display for TranslationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationError::InputNotFound(path) => {
                write!(f, "Input file not found: {}", path.display())
            }
            TranslationError::ConfigError(msg) => write!(f, "Invalid configuration: {}", msg),
            TranslationError::IoError(e) => write!(f, "IO error: {}", e),
            TranslationError::DatabaseError(e) => write!(f, "Cache database error: {}", e),
            TranslationError::BackendError(e) => write!(f, "Translation backend error: {}", e),
            TranslationError::OtherError(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for TranslationError {}

impl From<std::io::Error> for TranslationError {
    fn from(err: std::io::Error) -> Self {
        TranslationError::IoError(err)
    }
}

impl From<rusqlite::Error> for TranslationError {
    fn from(err: rusqlite::Error) -> Self {
        TranslationError::DatabaseError(err)
    }
}

impl From<BackendError> for TranslationError {
    fn from(err: BackendError) -> Self {
        TranslationError::BackendError(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub processed_batches: usize,
    pub total_batches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Translated {
        html: String,
        segments: usize,
        unique: usize,
    },
    /// Nothing to translate; the caller leaves files untouched.
    NoTranslatableContent,
}

/// Runs the whole pipeline over one document held in memory.
pub async fn translate_html<T: Translator>(
    html: &str,
    cfg: &TranslationConfig,
    translator: &T,
    cache: Option<&mut Cache>,
    send_progress: Option<&dyn Fn(Progress)>,
) -> Result<Outcome, TranslationError> {
    cfg.validate()?;

    let (protected, protection) = protect::protect(html, &cfg.protected_tags)?;
    log::debug!("Protected {} block(s)", protection.len());

    let segmenter = PatternSegmenter::new(cfg, protection.marker());
    let segments = segmenter.segments(&protected);
    if segments.is_empty() {
        log::info!("No translatable text found");
        return Ok(Outcome::NoTranslatableContent);
    }

    let (map, report) =
        translator::translate_segments(translator, &segments, cfg, cache, send_progress).await?;

    let translated = reinsert::reinsert(&segmenter, &protected, &map);
    let translated = lang_tag::rewrite_lang(&translated, &cfg.dst_lang);
    let translated = protect::restore(&translated, &protection);

    Ok(Outcome::Translated {
        html: translated,
        segments: segments.len(),
        unique: report.unique,
    })
}

pub trait TranslationService {
    async fn translate(
        &self,
        input: &Path,
        output: &OutputMode,
        cfg: &TranslationConfig,
    ) -> Result<Outcome, TranslationError>;
}

/// Translates HTML files on disk, keeping a backup of the original.
pub struct HtmlTranslationService<TB, SP> {
    translator_builder: TB,
    cache_path: Option<PathBuf>,
    send_progress: Option<SP>,
}

impl<TB, SP> HtmlTranslationService<TB, SP> {
    pub fn new(
        translator_builder: TB,
        cache_path: Option<PathBuf>,
        send_progress: Option<SP>,
    ) -> Self {
        HtmlTranslationService {
            translator_builder,
            cache_path,
            send_progress,
        }
    }
}

impl<TB, SP> TranslationService for HtmlTranslationService<TB, SP>
where
    TB: TranslatorBuilder,
    SP: Fn(Progress),
{
    async fn translate(
        &self,
        input: &Path,
        output: &OutputMode,
        cfg: &TranslationConfig,
    ) -> Result<Outcome, TranslationError> {
        cfg.validate()?;
        if !input.is_file() {
            return Err(TranslationError::InputNotFound(input.to_owned()));
        }

        let html = tokio::fs::read_to_string(input).await?;

        let translator = self.translator_builder.build().await?;
        let mut cache = match self.cache_path.as_deref() {
            Some(path) => Some(Cache::new(path, &cfg.src_lang, &cfg.dst_lang)?),
            None => None,
        };

        log::info!(
            "Translating {} ({} -> {})",
            input.display(),
            cfg.src_lang,
            cfg.dst_lang
        );
        let outcome = translate_html(
            &html,
            cfg,
            &translator,
            cache.as_mut(),
            self.send_progress.as_ref().map(|sp| sp as &dyn Fn(Progress)),
        )
        .await?;

        if let Outcome::Translated { html: translated, .. } = &outcome {
            let backup = backup_path(input, &cfg.src_lang);
            if !backup.exists() {
                tokio::fs::write(&backup, &html).await?;
                log::info!("Backup written to {}", backup.display());
            }

            let output_path = output.resolve(input, &cfg.dst_lang);
            write_atomically(&output_path, translated.clone()).await?;
            log::info!("Translated file written to {}", output_path.display());
        }

        Ok(outcome)
    }
}

/// Writes through a temporary sibling file so a failure never leaves half a document behind.
async fn write_atomically(path: &Path, content: String) -> Result<(), TranslationError> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || -> Result<(), TranslationError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        if let Ok(meta) = std::fs::metadata(&path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.persist(&path).map_err(|e| TranslationError::IoError(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| TranslationError::OtherError(e.into()))?
}
