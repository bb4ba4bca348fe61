pub mod questionnaire_sink;
pub mod tidb_store;
pub mod translation_cache;

pub use questionnaire_sink::{MemorySink, QuestionnaireSink};
pub use tidb_store::{StoreSettings, TidbStore};
pub use translation_cache::TranslationCache;
