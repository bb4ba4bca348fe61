pub mod loaders;
pub mod prediction;
pub mod question;
pub mod questionnaire;
pub mod store;
pub mod task;

pub use loaders::{load_bank, load_questionnaire, load_records};
pub use prediction::PredictionRecord;
pub use question::{AnswerOption, AssignedQuestion, ComparisonQuestion, RawPair, SourceRef, TargetLabel};
pub use questionnaire::QuestionnaireFile;
pub use store::{QuestionnaireRecord, QuestionnaireStatus, StoredQuestionnaire, SubmissionRow};
pub use task::{FieldMapping, TaskKind};
