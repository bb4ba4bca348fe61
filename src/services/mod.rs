pub mod aligner;
pub mod bank_builder;
pub mod bank_splitter;
pub mod exporter;
pub mod importer;
pub mod translator;

pub use aligner::{align_records, AlignMode, AlignedPair, Alignment};
pub use bank_builder::{build_bank, BuildOptions, BuildReport};
pub use bank_splitter::{split_bank, SplitPlan};
pub use exporter::{merge_into_banks, merge_questionnaire, BankExport};
pub use importer::{import_questionnaires, scan_questionnaires, ImportOptions, ImportReport};
pub use translator::{RetryPolicy, Translator};
