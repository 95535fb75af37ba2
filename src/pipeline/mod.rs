pub mod brand_voice;
pub mod cost;
pub mod generation;
pub mod parser;
pub mod prompts;
pub mod quota;
pub mod revision;
