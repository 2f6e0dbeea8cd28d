pub mod check_config;
pub mod doc_split;
pub mod evaluate;
