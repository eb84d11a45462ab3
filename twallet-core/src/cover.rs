use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;

/// Encodes a cover image as the `data:` URI the service expects.
///
/// Returns `None`, after logging the detected type, for anything that is not a
/// JPEG or PNG. An unsupported cover never fails template creation.
pub(crate) fn cover_data_uri(cover: &[u8]) -> Option<String> {
    match image::guess_format(cover) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Some(format!(
            "data:{};base64,{}",
            format.to_mime_type(),
            STANDARD.encode(cover)
        )),
        Ok(format) => {
            log::warn!(
                "CreateVCItem detectedMimeType={}",
                format.to_mime_type()
            );
            None
        }
        Err(_) => {
            log::warn!("CreateVCItem detectedMimeType=application/octet-stream");
            None
        }
    }
}
