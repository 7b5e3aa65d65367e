//! I/O を持たないビジネスロジック

pub mod fetch_logic;
pub mod html_normalizer;
pub mod report_logic;
