pub mod config_service;
pub mod conversation_store;
pub mod paths;
pub mod secret_store;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::conversation_store::{KvConversationStore, CONVERSATIONS_KEY};
pub use crate::paths::FolioPaths;
pub use crate::secret_store::{KvSecretStore, API_KEY_STORAGE_KEY};
pub use crate::storage::FileKeyValueStore;
