pub mod cache;
pub mod common;
pub mod completions;
pub mod detect;
pub mod run;
pub mod seed;
