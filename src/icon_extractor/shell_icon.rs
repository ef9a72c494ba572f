//! Windows shell icons.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use image::RgbaImage;
use tracing::debug;
use windows::Win32::Foundation::{HWND, SIZE};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, CreateCompatibleDC, CreateDIBSection, DIB_RGB_COLORS,
    DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC, SelectObject,
};
use windows::Win32::Storage::FileSystem::FILE_ATTRIBUTE_NORMAL;
use windows::Win32::UI::Controls::IImageList;
use windows::Win32::UI::Shell::{
    SHFILEINFOW, SHGFI_SYSICONINDEX, SHGetFileInfoW, SHGetImageList, SHIL_EXTRALARGE, SHIL_JUMBO,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DI_NORMAL, DestroyIcon, DrawIconEx, GetIconInfo, HICON, ICONINFO,
};
use windows::core::PCWSTR;

use crate::error::ExtractError;

/// Extract the highest-resolution shell icon for a path.
/// Tries SHIL_JUMBO (256×256), then SHIL_EXTRALARGE (48×48), then the
/// windows-icons crate.
pub fn extract_icon(path: &Path) -> Result<RgbaImage, ExtractError> {
    let wide_path = to_wide(path.as_os_str());

    if let Some(img) = extract_shell_icon(&wide_path, SHIL_JUMBO as i32) {
        debug!(path = %path.display(), width = img.width(), height = img.height(), "shell icon [JUMBO]");
        return Ok(img);
    }

    if let Some(img) = extract_shell_icon(&wide_path, SHIL_EXTRALARGE as i32) {
        debug!(path = %path.display(), width = img.width(), height = img.height(), "shell icon [EXTRALARGE]");
        return Ok(img);
    }

    let path_str = path.to_string_lossy();
    windows_icons::get_icon_by_path(&path_str).map_err(|e| ExtractError::Unavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

fn extract_shell_icon(wide_path: &[u16], image_list_type: i32) -> Option<RgbaImage> {
    unsafe {
        let mut shfi = SHFILEINFOW::default();
        let result = SHGetFileInfoW(
            PCWSTR(wide_path.as_ptr()),
            FILE_ATTRIBUTE_NORMAL,
            Some(&mut shfi),
            std::mem::size_of::<SHFILEINFOW>() as u32,
            SHGFI_SYSICONINDEX,
        );
        if result == 0 {
            return None;
        }

        let image_list: IImageList = SHGetImageList(image_list_type).ok()?;

        let mut size = SIZE::default();
        image_list.GetIconSize(&mut size.cx, &mut size.cy).ok()?;
        let (icon_w, icon_h) = (size.cx as u32, size.cy as u32);
        if icon_w == 0 || icon_h == 0 {
            return None;
        }

        let hicon = image_list.GetIcon(shfi.iIcon, 0).ok()?;
        let img = hicon_to_rgba(hicon, icon_w, icon_h);
        let _ = DestroyIcon(hicon);
        img
    }
}

/// Draws `hicon` into a top-down 32-bit DIB and reads it back as RGBA.
/// Entirely transparent results count as no icon.
unsafe fn hicon_to_rgba(hicon: HICON, width: u32, height: u32) -> Option<RgbaImage> {
    unsafe {
        let mut icon_info = ICONINFO::default();
        if GetIconInfo(hicon, &mut icon_info).is_err() {
            return None;
        }

        let hdc_screen = GetDC(HWND::default());
        let hdc = CreateCompatibleDC(hdc_screen);

        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            bmiColors: [Default::default()],
        };

        let mut bits_ptr: *mut std::ffi::c_void = std::ptr::null_mut();
        let hbm = match CreateDIBSection(hdc, &bmi, DIB_RGB_COLORS, &mut bits_ptr, None, 0) {
            Ok(hbm) => hbm,
            Err(_) => {
                DeleteDC(hdc);
                ReleaseDC(HWND::default(), hdc_screen);
                release_icon_bitmaps(&icon_info);
                return None;
            }
        };
        let old_bm = SelectObject(hdc, hbm);

        let drawn = DrawIconEx(
            hdc,
            0,
            0,
            hicon,
            width as i32,
            height as i32,
            0,
            None,
            DI_NORMAL,
        );

        let mut pixels = vec![0u8; (width * height * 4) as usize];
        if drawn.is_ok() {
            GetDIBits(
                hdc,
                hbm,
                0,
                height,
                Some(pixels.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            );
        }

        SelectObject(hdc, old_bm);
        DeleteObject(hbm);
        DeleteDC(hdc);
        ReleaseDC(HWND::default(), hdc_screen);
        release_icon_bitmaps(&icon_info);
        drawn.ok()?;

        // BGRA -> RGBA
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        let img = RgbaImage::from_raw(width, height, pixels)?;
        img.pixels().any(|p| p.0[3] > 0).then_some(img)
    }
}

/// `GetIconInfo` hands ownership of both bitmaps to the caller.
unsafe fn release_icon_bitmaps(icon_info: &ICONINFO) {
    unsafe {
        if !icon_info.hbmColor.is_invalid() {
            DeleteObject(icon_info.hbmColor);
        }
        if !icon_info.hbmMask.is_invalid() {
            DeleteObject(icon_info.hbmMask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_extraction_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "x").unwrap();

        let first = extract_icon(&file).unwrap();
        for _ in 0..64 {
            let again = extract_icon(&file).unwrap();
            assert_eq!(again.dimensions(), first.dimensions());
        }
    }
}
