pub mod db;
pub mod excuse_llm;
pub mod fs;
pub mod tts;

pub use db::DbAdapter;
pub use excuse_llm::OpenAiExcuseAdapter;
pub use fs::FsArtifactStore;
pub use tts::OpenAiTtsAdapter;
