//! Opaque handles for dropped items, before their file location is known.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use url::Url;

/// Type identifier declared by application bundles.
pub const APPLICATION_FILE: &str = "com.apple.application-file";

/// Type identifier declared by anything that carries a file url.
pub const FILE_URL: &str = "public.file-url";

/// Payload produced by a type-identifier loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedItem {
    Url(Url),
    /// The byte representation of a url (or of an absolute path).
    EmbeddedBytes(Vec<u8>),
}

/// One dropped item. The drop source creates it, the coordinator consumes it
/// exactly once.
#[async_trait]
pub trait ItemReference: Send + Sync {
    /// Every type identifier the item declares.
    fn type_identifiers(&self) -> Vec<String>;

    fn conforms_to(&self, type_identifier: &str) -> bool {
        self.type_identifiers()
            .iter()
            .any(|declared| declared == type_identifier)
    }

    /// Whether the item can hand over a url object without going through a
    /// type-identifier loader.
    fn can_load_url(&self) -> bool;

    async fn load_item(&self, type_identifier: &str) -> Result<LoadedItem, String>;

    async fn load_url(&self) -> Result<Url, String>;
}

/// In-memory item reference with fixed payloads.
///
/// Drop sources that already know their payloads (and the driver binary)
/// build their batches from these.
#[derive(Debug, Clone, Default)]
pub struct DroppedItem {
    declared: Vec<String>,
    payloads: HashMap<String, Result<LoadedItem, String>>,
    url_object: Option<Result<Url, String>>,
}

impl DroppedItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference for a local path, declared the way a file manager does:
    /// bundles as application files, everything as a file url.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let url = Url::from_file_path(path).ok()?;
        let is_bundle = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("app"));

        let mut item = Self::new();
        if is_bundle {
            item = item.declaring(APPLICATION_FILE, LoadedItem::Url(url.clone()));
        }
        Some(item.declaring(FILE_URL, LoadedItem::Url(url)))
    }

    pub fn declaring(mut self, type_identifier: &str, payload: LoadedItem) -> Self {
        self.declare(type_identifier);
        self.payloads
            .insert(type_identifier.to_string(), Ok(payload));
        self
    }

    /// Declares a type identifier whose loader fails with `reason`.
    pub fn declaring_failure(mut self, type_identifier: &str, reason: impl Into<String>) -> Self {
        self.declare(type_identifier);
        self.payloads
            .insert(type_identifier.to_string(), Err(reason.into()));
        self
    }

    /// Declares a type identifier with no payload behind it.
    pub fn declaring_only(mut self, type_identifier: &str) -> Self {
        self.declare(type_identifier);
        self
    }

    pub fn with_url_object(mut self, url: Url) -> Self {
        self.url_object = Some(Ok(url));
        self
    }

    fn declare(&mut self, type_identifier: &str) {
        if !self.declared.iter().any(|d| d == type_identifier) {
            self.declared.push(type_identifier.to_string());
        }
    }
}

#[async_trait]
impl ItemReference for DroppedItem {
    fn type_identifiers(&self) -> Vec<String> {
        self.declared.clone()
    }

    fn can_load_url(&self) -> bool {
        self.url_object.is_some()
    }

    async fn load_item(&self, type_identifier: &str) -> Result<LoadedItem, String> {
        match self.payloads.get(type_identifier) {
            Some(payload) => payload.clone(),
            None => Err(format!("no payload for `{type_identifier}`")),
        }
    }

    async fn load_url(&self) -> Result<Url, String> {
        self.url_object
            .clone()
            .unwrap_or_else(|| Err("no url object".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_declares_bundle_first() {
        let item = DroppedItem::from_path("/Applications/Notes.app").unwrap();
        assert_eq!(item.type_identifiers(), vec![APPLICATION_FILE, FILE_URL]);
        assert!(!item.can_load_url());
    }

    #[test]
    fn test_from_path_plain_file() {
        let item = DroppedItem::from_path("/tmp/picture.PNG").unwrap();
        assert!(item.conforms_to(FILE_URL));
        assert!(!item.conforms_to(APPLICATION_FILE));
    }

    #[test]
    fn test_from_path_rejects_relative() {
        assert!(DroppedItem::from_path("relative/file.txt").is_none());
    }

    #[tokio::test]
    async fn test_failing_loader() {
        let item = DroppedItem::new().declaring_failure(FILE_URL, "provider went away");
        assert_eq!(
            item.load_item(FILE_URL).await,
            Err("provider went away".to_string())
        );
        assert!(item.load_url().await.is_err());
    }
}
