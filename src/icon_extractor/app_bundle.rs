//! Application bundle icons, read straight from the bundle.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use icns::{IconFamily, IconType, PixelFormat};
use image::RgbaImage;
use plist::Value as PlistValue;
use tracing::debug;

use crate::error::ExtractError;

/// Loads the largest decodable representation of the icon named by the
/// bundle's `Info.plist`.
pub fn load_bundle_icon(bundle: &Path) -> Result<RgbaImage, ExtractError> {
    let icns_path = icon_file_path(bundle)?;
    decode_icns(&icns_path)
}

fn icon_file_path(bundle: &Path) -> Result<PathBuf, ExtractError> {
    let plist_path = bundle.join("Contents").join("Info.plist");
    let dict = PlistValue::from_file(&plist_path)?
        .into_dictionary()
        .ok_or_else(|| ExtractError::NoBundleIcon(bundle.to_path_buf()))?;

    let icon_name = dict
        .get("CFBundleIconFile")
        .or_else(|| dict.get("CFBundleIconName"))
        .and_then(PlistValue::as_string)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExtractError::NoBundleIcon(bundle.to_path_buf()))?;

    let mut icns_path = bundle.join("Contents/Resources").join(icon_name);
    if icns_path.extension().is_none() {
        icns_path.set_extension("icns");
    }
    Ok(icns_path)
}

fn decode_icns(icns_path: &Path) -> Result<RgbaImage, ExtractError> {
    let file = BufReader::new(fs::File::open(icns_path)?);
    let family = IconFamily::read(file)?;

    let mut types: Vec<IconType> = family.available_icons();
    types.sort_by_key(|t| std::cmp::Reverse(t.pixel_width() * t.pixel_height()));

    for icon_type in types {
        match family.get_icon_with_type(icon_type) {
            Ok(icon) => {
                let rgba = icon.convert_to(PixelFormat::RGBA);
                let (width, height) = (rgba.width(), rgba.height());
                if let Some(image) = RgbaImage::from_raw(width, height, rgba.into_data().into_vec()) {
                    return Ok(image);
                }
            }
            // JPEG 2000 payloads and friends; try the next size.
            Err(e) => debug!(path = %icns_path.display(), ?icon_type, error = %e, "skipping icns entry"),
        }
    }

    Err(ExtractError::NoBundleIcon(icns_path.to_path_buf()))
}
