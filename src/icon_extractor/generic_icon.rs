//! Built-in icons for platforms without a shell icon service.

use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::ExtractError;

pub const GENERIC_ICON_SIZE: u32 = 256;

const OUTLINE: Rgba<u8> = Rgba([120, 120, 128, 255]);
const PAPER: Rgba<u8> = Rgba([250, 250, 252, 255]);
const FOLD: Rgba<u8> = Rgba([214, 214, 220, 255]);
const FOLDER_BACK: Rgba<u8> = Rgba([78, 150, 230, 255]);
const FOLDER_FRONT: Rgba<u8> = Rgba([104, 172, 245, 255]);

/// Folder icon for directories (including bundles without an icon),
/// document icon for everything else.
pub fn generic_icon(path: &Path) -> Result<RgbaImage, ExtractError> {
    let metadata = fs::metadata(path).map_err(|e| ExtractError::Unavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(if metadata.is_dir() {
        folder_icon(GENERIC_ICON_SIZE)
    } else {
        document_icon(GENERIC_ICON_SIZE)
    })
}

fn document_icon(size: u32) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let (left, right) = (size / 5, size - size / 5);
    let (top, bottom) = (size / 16, size - size / 16);
    let fold = size / 5;

    for y in top..bottom {
        for x in left..right {
            // The top-right corner is cut off diagonally.
            let into_fold = (right - x) + (y - top);
            if into_fold < fold {
                continue;
            }
            let edge = x < left + 3 || x >= right - 3 || y < top + 3 || y >= bottom - 3;
            let color = if edge || into_fold < fold + 3 {
                OUTLINE
            } else if x >= right - fold && y < top + fold && (x - (right - fold)) <= (y - top) {
                FOLD
            } else {
                PAPER
            };
            img.put_pixel(x, y, color);
        }
    }
    img
}

fn folder_icon(size: u32) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let (left, right) = (size / 16, size - size / 16);
    let (tab_top, body_top, bottom) = (size / 5, size / 5 + size / 12, size - size / 6);
    let tab_right = left + size * 2 / 5;

    for y in tab_top..bottom {
        for x in left..right {
            let color = if y < body_top {
                if x < tab_right { FOLDER_BACK } else { continue }
            } else if y < body_top + size / 10 {
                FOLDER_BACK
            } else {
                FOLDER_FRONT
            };
            img.put_pixel(x, y, color);
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_and_folder_differ() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let doc = generic_icon(&file).unwrap();
        let folder = generic_icon(dir.path()).unwrap();

        assert_eq!(doc.dimensions(), (GENERIC_ICON_SIZE, GENERIC_ICON_SIZE));
        assert_eq!(folder.dimensions(), (GENERIC_ICON_SIZE, GENERIC_ICON_SIZE));
        assert_ne!(doc, folder);
        // Corners stay transparent.
        assert_eq!(doc.get_pixel(0, 0).0[3], 0);
        assert_eq!(folder.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_missing_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = generic_icon(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ExtractError::Unavailable { .. }));
    }
}
