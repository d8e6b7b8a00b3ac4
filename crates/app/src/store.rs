//! JSON-file history store: the conversation snapshot serialized as a
//! message array.

use shared::chat::Message;
use shared::contracts::HistoryStore;
use std::path::PathBuf;

pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> anyhow::Result<Vec<Message>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, messages: &[Message]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(messages)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat::Role;

    #[test]
    fn round_trips_a_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));

        let messages = vec![
            Message::text(Role::User, "what is rust?"),
            Message::text(Role::Assistant, "a systems language"),
        ];
        store.save(&messages).unwrap();

        assert_eq!(store.load().unwrap(), messages);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("deep/nested/history.json"));
        store.save(&[Message::text(Role::User, "hi")]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
