use std::io::Cursor;
use std::path::Path;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use crate::constants::{
    MAX_IMAGE_DIMENSION, MAX_PIXEL_COUNT, SUPPORTED_EXTENSIONS, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_SIZE,
};

// 画像サイズ検証（DoS防止）
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err("無効な画像サイズ: 幅または高さが0".to_string());
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(format!(
            "画像サイズが大きすぎます: {}x{} (最大: {})",
            width, height, MAX_IMAGE_DIMENSION
        ));
    }
    let pixel_count = (width as u64) * (height as u64);
    if pixel_count > MAX_PIXEL_COUNT {
        return Err(format!(
            "ピクセル数が多すぎます: {} (最大: {})",
            pixel_count, MAX_PIXEL_COUNT
        ));
    }
    Ok(())
}

// 小文字化した拡張子を取得
fn lowercase_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// 一覧対象か判定（隠しファイル除外・拡張子フィルタ）
pub fn is_listable_image(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') {
        return false;
    }
    match lowercase_extension(name) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

// 拡張子から Content-Type を取得
pub fn content_type_for(name: &str) -> &'static str {
    match lowercase_extension(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

// 画像をサムネイルに変換（長辺THUMBNAIL_SIZE・JPEG）
pub fn create_thumbnail(img: &DynamicImage) -> Result<Vec<u8>, String> {
    // Lanczos3: 縮小時の画質優先。アスペクト比は resize が維持する
    let thumbnail = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    // JPEGはアルファ非対応のためRGBへ
    let rgb = DynamicImage::ImageRgb8(thumbnail.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| format!("サムネイル書き出しエラー: {}", e))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listable_filter_matches_extension_case_insensitively() {
        assert!(is_listable_image("a.jpg"));
        assert!(is_listable_image("B.PNG"));
        assert!(is_listable_image("c.Webp"));
        assert!(is_listable_image("vector.svg"));
        assert!(!is_listable_image(".hidden.jpg"));
        assert!(!is_listable_image("notes.txt"));
        assert!(!is_listable_image("no_extension"));
        assert!(!is_listable_image(""));
    }

    #[test]
    fn content_type_defaults_to_octet_stream() {
        assert_eq!(content_type_for("x.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("x.svg"), "image/svg+xml");
        assert_eq!(content_type_for("x.raw"), "application/octet-stream");
    }

    #[test]
    fn validate_dimensions_rejects_zero_and_oversized() {
        assert!(validate_dimensions(0, 10).is_err());
        assert!(validate_dimensions(MAX_IMAGE_DIMENSION + 1, 10).is_err());
        assert!(validate_dimensions(20_000, 20_000).is_err());
        assert!(validate_dimensions(4000, 3000).is_ok());
    }

    #[test]
    fn thumbnail_longer_edge_is_fixed_size() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(800, 200));
        let jpeg = create_thumbnail(&img).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (THUMBNAIL_SIZE, 100));
    }

    #[test]
    fn thumbnail_upscales_small_portrait_images() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(50, 100));
        let jpeg = create_thumbnail(&img).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, THUMBNAIL_SIZE));
    }
}
