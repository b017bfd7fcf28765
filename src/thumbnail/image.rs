use std::fs;
use std::io::Cursor;
use std::path::Path;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use crate::image_utils::validate_dimensions;

// バイト列をデコードし、EXIFの向きを適用
pub fn decode_oriented(data: &[u8]) -> Result<DynamicImage, String> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("形式判定エラー: {}", e))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| format!("画像読み込みエラー: {}", e))?;

    // 向き情報が読めない場合は無変換
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let (width, height) = decoder.dimensions();
    validate_dimensions(width, height)?;

    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| format!("画像デコードエラー: {}", e))?;
    img.apply_orientation(orientation);

    Ok(img)
}

// ローカルファイルから読み込んでデコード
pub fn decode_file(path: &Path) -> Result<DynamicImage, String> {
    let data = fs::read(path).map_err(|e| format!("ファイル読み込みエラー: {}", e))?;
    decode_oriented(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decodes_png_from_memory() {
        let img = decode_oriented(&png_bytes(30, 20)).unwrap();
        assert_eq!((img.width(), img.height()), (30, 20));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(decode_oriented(b"definitely not an image").is_err());
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(decode_file(Path::new("/nonexistent/photo.jpg")).is_err());
    }
}
