//! Picks a resolution strategy for a dropped item and resolves it to a file.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::reference::{APPLICATION_FILE, FILE_URL, ItemReference, LoadedItem};

/// Where the url of an item comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlLoader {
    /// The loader registered for a declared type identifier.
    TypeIdentifier(&'static str),
    /// The item's own url object.
    UrlObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectUrl(UrlLoader),
    Unsupported,
}

/// How the resolved url was carried by the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    DirectUrl,
    EmbeddedBytes,
}

/// A concrete, absolute file-system location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    url: Url,
    path: PathBuf,
    extension: String,
    payload: PayloadKind,
}

impl ResolvedFile {
    pub fn from_url(url: Url, payload: PayloadKind) -> Result<Self, ResolveError> {
        if url.scheme() != "file" {
            return Err(ResolveError::NotAFileUrl(url));
        }
        let path = url
            .to_file_path()
            .map_err(|()| ResolveError::NotAFileUrl(url.clone()))?;
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            url,
            path,
            extension,
            payload,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let url = Url::from_file_path(path).map_err(|()| ResolveError::Missing(path.into()))?;
        Self::from_url(url, PayloadKind::DirectUrl)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension as declared, without the dot. Empty when there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn payload(&self) -> PayloadKind {
        self.payload
    }

    /// File name without its extension, e.g. `Notes` for `Notes.app`.
    pub fn label(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

/// Decides how an item is resolved. The first match wins: application
/// bundles before url objects before generic file urls, so an item that
/// advertises overlapping identifiers resolves through the most specific one.
pub fn classify(item: &dyn ItemReference) -> Strategy {
    let strategy = if item.conforms_to(APPLICATION_FILE) {
        Strategy::DirectUrl(UrlLoader::TypeIdentifier(APPLICATION_FILE))
    } else if item.can_load_url() {
        Strategy::DirectUrl(UrlLoader::UrlObject)
    } else if item.conforms_to(FILE_URL) {
        Strategy::DirectUrl(UrlLoader::TypeIdentifier(FILE_URL))
    } else {
        Strategy::Unsupported
    };

    debug!(?strategy, declared = ?item.type_identifiers(), "classified item");
    strategy
}

/// Runs the loader picked by [`classify`]. This is the only step of the
/// pipeline that waits on the drop source.
pub async fn resolve(
    item: &dyn ItemReference,
    loader: UrlLoader,
) -> Result<ResolvedFile, ResolveError> {
    let file = match loader {
        UrlLoader::UrlObject => {
            let url = item.load_url().await.map_err(ResolveError::UrlObject)?;
            ResolvedFile::from_url(url, PayloadKind::DirectUrl)?
        }
        UrlLoader::TypeIdentifier(type_identifier) => {
            let loaded =
                item.load_item(type_identifier)
                    .await
                    .map_err(|reason| ResolveError::Load {
                        type_identifier: type_identifier.to_string(),
                        reason,
                    })?;
            match loaded {
                LoadedItem::Url(url) => ResolvedFile::from_url(url, PayloadKind::DirectUrl)?,
                LoadedItem::EmbeddedBytes(bytes) => {
                    ResolvedFile::from_url(url_from_bytes(&bytes)?, PayloadKind::EmbeddedBytes)?
                }
            }
        }
    };

    if !file.path().exists() {
        return Err(ResolveError::Missing(file.path.clone()));
    }
    Ok(file)
}

/// Interprets the byte representation of a url. Bare absolute paths are
/// accepted too.
fn url_from_bytes(bytes: &[u8]) -> Result<Url, ResolveError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ResolveError::InvalidEncoding)?;
    let text = text.trim_end_matches('\0').trim();

    if Path::new(text).is_absolute() {
        if let Ok(url) = Url::from_file_path(text) {
            return Ok(url);
        }
    }

    match Url::parse(text) {
        // A one-letter scheme is a drive letter, not a url.
        Ok(url) if url.scheme().len() == 1 => Err(ResolveError::NotAFileUrl(url)),
        Ok(url) => Ok(url),
        Err(e) => Err(ResolveError::InvalidUrl(e)),
    }
}
