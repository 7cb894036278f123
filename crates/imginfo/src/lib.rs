//! Image type and dimension sniffing from raw bytes.
//!
//! Only headers are read; no pixel data is decoded. That is all a content
//! analyzer needs from an embedded image, and it keeps adversarial inputs
//! cheap: the probe touches a bounded prefix of the buffer.

const PNG_SIG: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

// JPEG marker bytes carrying frame dimensions (SOF0..SOF15, minus the
// non-frame markers DHT/DAC/RST in the same range).
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const M_DHT: u8 = 0xC4;
const M_DAC: u8 = 0xCC;

// how much of a JPEG we are willing to walk looking for a SOF marker
const JPEG_SCAN_LIMIT: usize = 256 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Ico,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Ico => "ico",
        }
    }
}

/// Sniffed image metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Detects the image format from magic bytes and extracts dimensions from
/// the header. Returns `None` for unrecognized or truncated data.
pub fn probe(data: &[u8]) -> Option<ImageInfo> {
    if data.starts_with(&PNG_SIG) {
        return probe_png(data);
    }
    if data.starts_with(&JPEG_SOI) {
        return probe_jpeg(data);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return probe_gif(data);
    }
    if data.starts_with(b"BM") {
        return probe_bmp(data);
    }
    if data.starts_with(&[0, 0, 1, 0]) {
        return probe_ico(data);
    }
    None
}

fn be32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be16(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn le16(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([b[0], b[1]])))
}

fn le32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

// The IHDR chunk is required to come first: signature, length, "IHDR",
// then width and height as big-endian u32.
fn probe_png(data: &[u8]) -> Option<ImageInfo> {
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = be32(data, 16)?;
    let height = be32(data, 20)?;
    (width > 0 && height > 0).then_some(ImageInfo {
        format: ImageFormat::Png,
        width,
        height,
    })
}

// Walk marker segments until a frame header (SOF); its payload is
// precision(1) height(2) width(2).
fn probe_jpeg(data: &[u8]) -> Option<ImageInfo> {
    let limit = data.len().min(JPEG_SCAN_LIMIT);
    let mut i = 2;
    while i + 4 <= limit {
        if data[i] != 0xFF {
            // not a marker boundary; likely corrupt
            return None;
        }
        let marker = data[i + 1];
        // skip fill bytes and standalone markers (RSTn, SOI, EOI, TEM)
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if matches!(marker, 0x01 | 0xD0..=0xD9) {
            i += 2;
            continue;
        }
        let seg_len = be16(data, i + 2)? as usize;
        if seg_len < 2 {
            return None;
        }
        if (0xC0..=0xCF).contains(&marker) && marker != M_DHT && marker != M_DAC {
            let height = be16(data, i + 5)?;
            let width = be16(data, i + 7)?;
            return (width > 0 && height > 0).then_some(ImageInfo {
                format: ImageFormat::Jpeg,
                width,
                height,
            });
        }
        i += 2 + seg_len;
    }
    None
}

fn probe_gif(data: &[u8]) -> Option<ImageInfo> {
    let width = le16(data, 6)?;
    let height = le16(data, 8)?;
    (width > 0 && height > 0).then_some(ImageInfo {
        format: ImageFormat::Gif,
        width,
        height,
    })
}

fn probe_bmp(data: &[u8]) -> Option<ImageInfo> {
    let width = le32(data, 18)?;
    // height may be negative for top-down bitmaps
    let height = (le32(data, 22)? as i32).unsigned_abs();
    (width > 0 && height > 0).then_some(ImageInfo {
        format: ImageFormat::Bmp,
        width,
        height,
    })
}

// First directory entry; a zero byte means 256 in ICONDIR.
fn probe_ico(data: &[u8]) -> Option<ImageInfo> {
    let count = le16(data, 4)?;
    if count == 0 {
        return None;
    }
    let w = *data.get(6)?;
    let h = *data.get(7)?;
    Some(ImageInfo {
        format: ImageFormat::Ico,
        width: if w == 0 { 256 } else { u32::from(w) },
        height: if h == 0 { 256 } else { u32::from(h) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PNG_SIG);
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&[8, 2, 0, 0, 0]);
        out
    }

    fn jpeg_bytes(width: u16, height: u16) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        // APP0 segment to make the walker skip something
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        out.extend_from_slice(&[0u8; 14]);
        // SOF0
        out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        out
    }

    #[test]
    fn probes_png_header() {
        let info = probe(&png_bytes(640, 480)).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (640, 480));
    }

    #[test]
    fn probes_jpeg_sof() {
        let info = probe(&jpeg_bytes(320, 200)).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!((info.width, info.height), (320, 200));
    }

    #[test]
    fn probes_gif_and_bmp_and_ico() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&100u16.to_le_bytes());
        gif.extend_from_slice(&50u16.to_le_bytes());
        gif.push(0);
        let info = probe(&gif).unwrap();
        assert_eq!(info.format, ImageFormat::Gif);
        assert_eq!((info.width, info.height), (100, 50));

        let mut bmp = vec![0u8; 26];
        bmp[0] = b'B';
        bmp[1] = b'M';
        bmp[18..22].copy_from_slice(&32i32.to_le_bytes());
        bmp[22..26].copy_from_slice(&(-16i32).to_le_bytes());
        let info = probe(&bmp).unwrap();
        assert_eq!(info.format, ImageFormat::Bmp);
        assert_eq!((info.width, info.height), (32, 16));

        let ico = [0u8, 0, 1, 0, 1, 0, 0, 0];
        let info = probe(&ico).unwrap();
        assert_eq!(info.format, ImageFormat::Ico);
        assert_eq!((info.width, info.height), (256, 256));
    }

    #[test]
    fn rejects_truncated_and_unknown_data() {
        assert!(probe(&[]).is_none());
        assert!(probe(b"not an image at all").is_none());
        assert!(probe(&PNG_SIG).is_none());
        assert!(probe(&png_bytes(640, 480)[..18]).is_none());
        assert!(probe(&[0xFF, 0xD8, 0xFF]).is_none());
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(probe(&png_bytes(0, 480)).is_none());
    }
}
