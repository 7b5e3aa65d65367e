//! メールソース関連モジュール

pub mod file_source;
pub mod message;
pub mod source;
pub mod walker;

pub use file_source::FileMailSource;
pub use message::{Header, Part, PartBody, RawMessage};
pub use source::MailSource;
pub use walker::{extract_all_parts, extract_all_parts_with_limits, ExtractedText, WalkLimits};
