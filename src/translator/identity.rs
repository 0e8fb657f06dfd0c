use super::{Translator, TranslatorBuilder};
use crate::BackendError;

pub struct IdentityTranslatorBuilder;

impl TranslatorBuilder for IdentityTranslatorBuilder {
    type Built = IdentityTranslator;

    async fn build(&self) -> Result<Self::Built, BackendError> {
        Ok(IdentityTranslator)
    }
}

/// Returns every text untouched, for dry runs.
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        _src_lang: &str,
        _dst_lang: &str,
    ) -> Result<Vec<String>, BackendError> {
        Ok(texts.to_vec())
    }

    async fn translate(
        &self,
        text: &str,
        _src_lang: &str,
        _dst_lang: &str,
    ) -> Result<String, BackendError> {
        Ok(text.to_owned())
    }
}
