pub mod jsonl_loader;

pub use jsonl_loader::{
    atomic_write, load_bank, load_questionnaire, load_records, write_json_pretty, write_jsonl,
    write_questionnaire,
};
