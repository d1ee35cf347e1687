use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use image::{DynamicImage, GenericImageView};
use webp::Encoder as WebpEncoder;

pub const CACHE_WEBP_QUALITY: f32 = 75.0;

/// Decodes fetched bytes, shrinks them to fit `max_dim` and returns a
/// `data:image/webp;base64,...` URI small enough to persist.
///
/// # Errors
///
/// Returns Err if the bytes are not a decodable image or encoding fails
pub fn to_cacheable_data_uri(bytes: &[u8], max_dim: u32) -> std::io::Result<String> {
    let img = image::load_from_memory(bytes).map_err(err_other)?;

    let (w, h) = img.dimensions();
    let img = if w <= max_dim && h <= max_dim {
        img
    } else {
        img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
    };
    // libwebp only takes 8-bit RGB(A)
    let img = DynamicImage::ImageRgba8(img.to_rgba8());

    let webp = WebpEncoder::from_image(&img)
        .map_err(err_other)?
        .encode(CACHE_WEBP_QUALITY);

    Ok(format!("data:image/webp;base64,{}", B64.encode(&*webp)))
}

/// Splits a base64 `data:` URI into its MIME type and raw bytes.
#[must_use]
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = B64.decode(payload.trim()).ok()?;
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Some((mime.to_string(), bytes))
}

fn err_other<E: std::fmt::Display>(e: E) -> std::io::Error {
    std::io::Error::other(e.to_string())
}
