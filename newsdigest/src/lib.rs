// Library interface for newsdigest modules
// This allows tests and the binary to import modules

pub mod collector;
pub mod delivery;
pub mod digest;
pub mod llm;
pub mod pipeline;
pub mod preferences;
pub mod query;
pub mod scraping;
pub mod search;
pub mod topics;
