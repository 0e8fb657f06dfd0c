use rosetta_html::settings::{self, BackendKind, Settings};
use rosetta_html::translator::TranslatorBuilder;
use rosetta_html::translator::google::GoogleTranslatorBuilder;
use rosetta_html::translator::identity::IdentityTranslatorBuilder;
use rosetta_html::translator::openai::OpenAiTranslatorBuilder;
use rosetta_html::*;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Log to stderr, override with `RUST_LOG=debug`
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let res = match settings.backend {
        BackendKind::Google => run(GoogleTranslatorBuilder::new(), &settings).await,
        BackendKind::OpenAi => {
            let builder = OpenAiTranslatorBuilder::new(
                settings.openai.model.clone(),
                settings.openai.api_key.clone(),
            )
            .with_temperature(settings.openai.temperature)
            .with_tone(settings.openai.tone.clone());
            run(builder, &settings).await
        }
        BackendKind::Identity => run(IdentityTranslatorBuilder, &settings).await,
    };

    match res {
        Ok(Outcome::Translated { segments, unique, .. }) => {
            log::info!("Done: {} segment(s), {} unique", segments, unique);
            ExitCode::SUCCESS
        }
        Ok(Outcome::NoTranslatableContent) => {
            log::info!("Nothing to translate, no files changed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run<TB: TranslatorBuilder>(
    translator_builder: TB,
    settings: &Settings,
) -> Result<Outcome, TranslationError> {
    let service = HtmlTranslationService::new(
        translator_builder,
        settings.cache_path.clone(),
        Some(|progress: Progress| {
            log::info!(
                "{}/{} batches translated",
                progress.processed_batches,
                progress.total_batches
            );
        }),
    );

    service
        .translate(&settings.input, &settings.output, &settings.translation)
        .await
}
