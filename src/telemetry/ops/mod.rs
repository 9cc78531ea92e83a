pub mod summarize;
pub mod serve;
