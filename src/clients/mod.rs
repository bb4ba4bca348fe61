pub mod translation_client;

pub use translation_client::{build_translation_prompt, OpenAiTranslator, TranslationBackend};
