pub mod google;
pub mod identity;
pub mod openai;

use crate::cache::Cache;
use crate::segment::Segment;
use crate::utils::preview;
use crate::{BackendError, Progress, TranslationConfig, TranslationError};
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use itertools::Itertools;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const RETRY_INITIAL_INTERVAL_MS: u64 = 2 * 1000;

pub trait TranslatorBuilder {
    type Built: Translator;

    async fn build(&self) -> Result<Self::Built, BackendError>;
}

/// External translation backend.
pub trait Translator {
    /// Whether `translate_batch` is a single backend call. When it is not, batches are
    /// sent item by item straight away so a failure never resends finished items.
    const NATIVE_BATCHES: bool = true;

    /// Must return exactly one translation per input, in input order.
    async fn translate_batch(
        &self,
        texts: &[String],
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<Vec<String>, BackendError>;

    async fn translate(
        &self,
        text: &str,
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<String, BackendError>;
}

/// Translated cores, addressable by exact segment text or by core.
#[derive(Debug, Clone, Default)]
pub struct TranslationMap {
    by_raw: HashMap<String, String>,
    by_core: HashMap<String, String>,
}

impl TranslationMap {
    pub fn insert_core(&mut self, core: String, translated: String) {
        self.by_core.insert(core, translated);
    }

    /// Indexes every segment whose core has a translation by its exact original text.
    pub fn bind_segments(&mut self, segments: &[Segment]) {
        for segment in segments {
            if let Some(translated) = self.by_core.get(&segment.core) {
                self.by_raw
                    .entry(segment.raw.clone())
                    .or_insert_with(|| translated.clone());
            }
        }
    }

    pub fn lookup(&self, segment: &Segment) -> Option<&str> {
        self.by_raw
            .get(&segment.raw)
            .or_else(|| self.by_core.get(&segment.core))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_core.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub unique: usize,
    pub cached: usize,
    pub batches: usize,
    pub fallback_batches: usize,
    pub failed_items: usize,
}

/// Translates every distinct core of `segments`, one backend batch at a time.
///
/// Backend failures never escape: a failed batch is retried item by item and an item that
/// still fails keeps its original text. Only cache errors are returned.
pub async fn translate_segments<T: Translator>(
    translator: &T,
    segments: &[Segment],
    cfg: &TranslationConfig,
    mut cache: Option<&mut Cache>,
    send_progress: Option<&dyn Fn(Progress)>,
) -> Result<(TranslationMap, BatchReport), TranslationError> {
    let mut map = TranslationMap::default();
    let mut report = BatchReport::default();

    let unique = segments
        .iter()
        .map(|s| s.core.as_str())
        .unique()
        .collect_vec();
    report.unique = unique.len();

    let mut pending = Vec::<String>::with_capacity(unique.len());
    for core in unique {
        match cache.as_deref() {
            Some(cache) => match cache.get(core)? {
                Some(translated) => {
                    map.insert_core(core.to_owned(), translated);
                    report.cached += 1;
                }
                None => pending.push(core.to_owned()),
            },
            None => pending.push(core.to_owned()),
        }
    }

    log::info!(
        "Translating {} unique text segment(s) {} -> {} ({} from cache)",
        report.unique,
        cfg.src_lang,
        cfg.dst_lang,
        report.cached
    );

    let total_batches = pending.len().div_ceil(cfg.batch_chunk_size);
    for (idx, chunk) in pending.chunks(cfg.batch_chunk_size).enumerate() {
        let translated = translate_chunk(translator, chunk, cfg, &mut report).await;
        report.batches += 1;

        for (original, translated) in chunk.iter().zip(translated) {
            match translated {
                Some(translated) => {
                    if let Some(cache) = cache.as_deref_mut() {
                        cache.insert(original, &translated)?;
                    }
                    map.insert_core(original.clone(), translated);
                }
                None => map.insert_core(original.clone(), original.clone()),
            }
        }

        if let Some(send_progress) = send_progress {
            send_progress(Progress {
                processed_batches: idx + 1,
                total_batches,
            });
        }
    }

    map.bind_segments(segments);

    if report.failed_items > 0 {
        log::warn!(
            "{} segment(s) could not be translated and were kept as is",
            report.failed_items
        );
    }

    Ok((map, report))
}

/// One translation per item; `None` marks an item left untranslated.
async fn translate_chunk<T: Translator>(
    translator: &T,
    chunk: &[String],
    cfg: &TranslationConfig,
    report: &mut BatchReport,
) -> Vec<Option<String>> {
    if T::NATIVE_BATCHES {
        match translator
            .translate_batch(chunk, &cfg.src_lang, &cfg.dst_lang)
            .await
        {
            Ok(translated) if translated.len() == chunk.len() => {
                return translated.into_iter().map(Some).collect();
            }
            Ok(translated) => log::warn!(
                "Batch of {} returned {} translation(s), translating items one by one",
                chunk.len(),
                translated.len()
            ),
            Err(e) => log::warn!(
                "Batch of {} failed ({}), translating items one by one",
                chunk.len(),
                e
            ),
        }
        report.fallback_batches += 1;
    }

    let mut result = Vec::with_capacity(chunk.len());
    for item in chunk {
        match translator.translate(item, &cfg.src_lang, &cfg.dst_lang).await {
            Ok(translated) => result.push(Some(translated)),
            Err(e) => {
                log::warn!(r#"Could not translate "{}": {}"#, preview(item, 40), e);
                report.failed_items += 1;
                result.push(None);
            }
        }
    }
    result
}

/// Retries `op` while the backend reports rate limiting.
pub(crate) async fn with_backoff<F, Fut, R>(mut op: F) -> Result<R, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, BackendError>>,
{
    let initial_interval = Duration::from_millis(RETRY_INITIAL_INTERVAL_MS);
    let mut backoff = ExponentialBackoff {
        initial_interval,
        current_interval: initial_interval,
        ..Default::default()
    };

    loop {
        match op().await {
            Err(BackendError::RateLimited(message)) => match backoff.next_backoff() {
                Some(duration) => {
                    log::warn!(
                        "Hit the rate limit ({}), sleeping for {} seconds",
                        message,
                        duration.as_secs()
                    );
                    tokio::time::sleep(duration).await;
                }
                None => return Err(BackendError::RateLimited(message)),
            },
            res => return res,
        }
    }
}
