//! Produces one icon image per resolved file.
//!
//! The file's extension picks the category: application bundles and generic
//! files get their icon from an [`IconProvider`], image files are their own
//! icon.

mod app_bundle;
#[cfg(not(windows))]
mod generic_icon;
#[cfg(windows)]
mod shell_icon;

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::classifier::ResolvedFile;
use crate::error::ExtractError;

pub use app_bundle::load_bundle_icon;

pub const BUNDLE_EXTENSION: &str = "app";

pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// The maximum size an image file can be in order to be loaded as an icon.
///
/// This value is in MiB.
pub const MAXIMUM_IMAGE_FILE_SIZE: u64 = MIB * 24;

/// The size of 1MiB in bytes
const MIB: u64 = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    ApplicationBundle,
    ImageFile,
    Generic,
}

impl FileCategory {
    /// Case-insensitive, `extension` is given without the dot.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        if ext == BUNDLE_EXTENSION {
            Self::ApplicationBundle
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::ImageFile
        } else {
            Self::Generic
        }
    }
}

/// An icon raster plus the logical size it is presented at.
///
/// The logical size is a hint only. The pixels keep their native resolution
/// until they are rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct IconImage {
    image: Arc<RgbaImage>,
    logical_size: u32,
}

impl IconImage {
    pub fn new(image: RgbaImage, logical_size: u32) -> Self {
        Self {
            image: Arc::new(image),
            logical_size,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn logical_size(&self) -> u32 {
        self.logical_size
    }

    /// Native pixel width and height.
    pub fn native_dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn with_logical_size(mut self, logical_size: u32) -> Self {
        self.logical_size = logical_size;
        self
    }
}

/// Source of icons the operating system would show for a path.
pub trait IconProvider: Send + Sync {
    /// Representative icon of an application bundle.
    fn bundle_icon(&self, bundle: &Path) -> Result<RgbaImage, ExtractError>;

    /// Icon shown for an arbitrary file or directory.
    fn file_icon(&self, path: &Path) -> Result<RgbaImage, ExtractError>;
}

/// Platform icon provider.
///
/// Bundles are read from their `Info.plist` / `.icns` pair on every platform
/// and fall back to the file icon when they carry none. File icons come from
/// the Windows shell on Windows and from a built-in document/folder icon
/// elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIconProvider;

impl IconProvider for SystemIconProvider {
    fn bundle_icon(&self, bundle: &Path) -> Result<RgbaImage, ExtractError> {
        load_bundle_icon(bundle).or_else(|e| {
            debug!(path = %bundle.display(), error = %e, "bundle icon unreadable, using file icon");
            self.file_icon(bundle)
        })
    }

    #[cfg(windows)]
    fn file_icon(&self, path: &Path) -> Result<RgbaImage, ExtractError> {
        shell_icon::extract_icon(path)
    }

    #[cfg(not(windows))]
    fn file_icon(&self, path: &Path) -> Result<RgbaImage, ExtractError> {
        generic_icon::generic_icon(path)
    }
}

#[derive(Debug, Default)]
pub struct IconExtractor<P = SystemIconProvider> {
    provider: P,
}

impl IconExtractor<SystemIconProvider> {
    pub fn new() -> Self {
        Self::with_provider(SystemIconProvider)
    }
}

impl<P: IconProvider> IconExtractor<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Extracts the icon for `file` and stamps it with `target_size` as its
    /// logical size, whatever its native resolution.
    pub fn extract(&self, file: &ResolvedFile, target_size: u32) -> Result<IconImage, ExtractError> {
        let path = file.path();
        let category = FileCategory::from_extension(file.extension());
        debug!(path = %path.display(), ?category, "extracting icon");

        if !path.exists() {
            warn!(path = %path.display(), "Icon FAIL: file does not exist");
            return Err(ExtractError::Missing(path.to_path_buf()));
        }

        let extracted = match category {
            FileCategory::ApplicationBundle => self.provider.bundle_icon(path),
            FileCategory::ImageFile => load_image_file(path),
            FileCategory::Generic => self.provider.file_icon(path),
        };

        match extracted {
            Ok(image) => {
                debug!(
                    path = %path.display(),
                    width = image.width(),
                    height = image.height(),
                    logical_size = target_size,
                    "Icon OK"
                );
                Ok(IconImage::new(image, target_size))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Icon FAIL");
                Err(e)
            }
        }
    }
}

/// Loads an image file's own pixels. The format is sniffed from the content,
/// not the extension.
fn load_image_file(path: &Path) -> Result<RgbaImage, ExtractError> {
    let mut file = fs::File::open(path)?;
    let size = file.metadata()?.len();
    if size > MAXIMUM_IMAGE_FILE_SIZE {
        return Err(ExtractError::TooLarge {
            size,
            limit: MAXIMUM_IMAGE_FILE_SIZE,
        });
    }

    let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
    file.read_to_end(&mut data)?;
    Ok(image::load_from_memory(&data)?.into_rgba8())
}
