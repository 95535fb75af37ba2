pub mod claude;
pub mod extractor;
pub mod gateway;
