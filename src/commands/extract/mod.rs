mod field_rules;
mod native_text;
mod ocr_text;
mod orchestrator;
mod run;
mod store;
mod types;

pub use run::run;
pub(crate) use store::{StoreSummary, summarize_store};
