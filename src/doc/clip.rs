//! The in-clip tagged-chunk stream reader: decodes `clip-data`'s sequence
//! of 8-byte-header chunks into clip fields, layers and images.

use super::layer::{Layer, LayerSettings};
use crate::{
    binreader::ByteReader,
    dict::Dict,
    error::FormatError,
    image::{Image, ImageKind},
};

const PREAMBLE_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// A decoded clip: dimensions, background color patterns, metadata and
/// its layer stack.
pub struct Clip {
    pub width: usize,
    pub height: usize,
    pub arat: Option<u32>,
    pub bgp1: [u8; 4],
    pub bgp2: [u8; 4],
    pub metadata: Dict,
    pub(crate) layers: Vec<Layer>,
}

impl Clip {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn background_color(&self) -> (u8, u8, u8, u8) {
        (self.bgp1[0], self.bgp1[1], self.bgp1[2], self.bgp1[3])
    }

    pub fn layers(&mut self) -> &mut [Layer] {
        &mut self.layers
    }
}

/// Decodes a `clip-data` node's payload: the 12-byte preamble followed by
/// the tagged-chunk stream described in §4.5.
pub(crate) fn decode_clip_data(data: &[u8], metadata: Dict) -> Result<Clip, FormatError> {
    if data.len() < PREAMBLE_LEN {
        return Err(FormatError::TruncatedChunk { needed: PREAMBLE_LEN, available: data.len() });
    }
    let form_size = u32::from_be_bytes(data[4..8].try_into().unwrap()) as usize;

    let mut clip = Clip {
        width: 0,
        height: 0,
        arat: None,
        bgp1: [0; 4],
        bgp2: [0; 4],
        metadata,
        layers: Vec::new(),
    };

    let mut cursor = PREAMBLE_LEN;
    let end = (PREAMBLE_LEN + form_size).min(data.len());

    // `LRSH` marks that the next `LRSR` inherits the current layer rather
    // than starting a fresh one; tracked so `LRSR` can find the right
    // source layer without looking ahead.
    let mut pending_ctg_source: Option<usize> = None;

    while cursor + CHUNK_HEADER_LEN <= end {
        let header = &data[cursor..cursor + CHUNK_HEADER_LEN];
        let ident: [u8; 4] = header[0..4].try_into().unwrap();
        let size = u32::from_be_bytes(header[4..8].try_into().unwrap()) as usize;

        let body_start = cursor + CHUNK_HEADER_LEN;
        let body_end = body_start + size;
        if body_end > data.len() {
            return Err(FormatError::TruncatedChunk {
                needed: size,
                available: data.len().saturating_sub(body_start),
            });
        }
        let body = &data[body_start..body_end];

        handle_chunk(&mut clip, &ident, body, &mut pending_ctg_source)?;

        let advance = if size % 2 == 1 { size + 1 } else { size };
        cursor = body_start + advance;
    }

    warn_on_num_images_mismatch(&clip);

    Ok(clip)
}

/// `LRHD.num_images` is never validated against the decoded image count in
/// the source; this crate warns instead of silently trusting the header
/// (§3, §9 "possibly buggy source behavior").
fn warn_on_num_images_mismatch(clip: &Clip) {
    #[cfg(feature = "log")]
    for layer in &clip.layers {
        let declared = layer.settings.num_images as usize;
        let actual = layer.num_images();
        if declared != actual {
            log::warn!(
                "layer {:?}: LRHD declared num_images={declared} but decoded {actual} images",
                layer.name
            );
        }
    }
    #[cfg(not(feature = "log"))]
    let _ = clip;
}

fn handle_chunk(
    clip: &mut Clip,
    ident: &[u8; 4],
    body: &[u8],
    pending_ctg_source: &mut Option<usize>,
) -> Result<(), FormatError> {
    match ident {
        b"DLOC" => {
            // Four BE u16 fields: width, height, then two more the source
            // decodes but never uses (`original_source/tvpexport/decoders.py::decode_DLOC`).
            let mut reader = ByteReader::new(body);
            clip.width = reader.read_u16()? as usize;
            clip.height = reader.read_u16()? as usize;
        }
        b"ARAT" => {
            let mut reader = ByteReader::new(body);
            clip.arat = Some(reader.read_u32()?);
        }
        b"BGP1" => clip.bgp1.copy_from_slice(&body[..4.min(body.len())]),
        b"BGP2" => clip.bgp2.copy_from_slice(&body[..4.min(body.len())]),
        // Decoded opportunistically but not required by any public field;
        // stub acknowledgement keeps the "tolerate, don't warn" contract
        // for chunks the reader recognizes but doesn't need.
        b"DGBL" | b"DPEL" | b"BGMD" | b"CRLR" | b"ANNO" | b"FRAT" | b"FILD" | b"MARK" | b"XSHT" | b"TLNT" => {}

        b"LNAM" => {
            let name = read_c_string(body);
            clip.layers.push(Layer::new(name, LayerSettings::default(), false));
            *pending_ctg_source = None;
        }
        b"LRHD" => {
            let settings = LayerSettings::parse(body)?;
            attach_settings(clip, settings)?;
        }
        b"LRSH" => {
            let settings = LayerSettings::parse(body)?;
            attach_settings(clip, settings)?;
            *pending_ctg_source = Some(clip.layers.len() - 1);
        }
        b"LRSR" => {
            let source_index = pending_ctg_source.ok_or(FormatError::OrphanLrsr)?;
            let (name, settings) = {
                let source = clip.layers.get(source_index).ok_or(FormatError::OrphanLrsr)?;
                (source.name.clone(), source.settings)
            };
            clip.layers.push(Layer::new(name, settings, true));
            *pending_ctg_source = None;
        }

        b"ZCHK" | b"DBOD" | b"SRAW" => {
            let kind = match ident {
                b"ZCHK" => ImageKind::Zchk,
                b"DBOD" => ImageKind::Dbod,
                _ => ImageKind::Sraw,
            };
            let layer = clip.layers.last_mut().ok_or(FormatError::MissingEntry("layer"))?;
            let index_in_layer = layer.num_images();
            layer
                .images
                .push(Image::new(kind, index_in_layer, body.to_vec(), clip.width, clip.height));
        }

        // Nested UTF-8 ini-like image-UID table; not consulted by any
        // public operation in this crate, so it is acknowledged and
        // dropped rather than stored.
        b"LEXT" => {}

        other => {
            #[cfg(feature = "log")]
            log::debug!("unknown clip chunk ident {:?}, skipping {} bytes", String::from_utf8_lossy(other), body.len());
            #[cfg(not(feature = "log"))]
            let _ = other;
        }
    }

    Ok(())
}

fn attach_settings(clip: &mut Clip, settings: LayerSettings) -> Result<(), FormatError> {
    let layer = clip.layers.last_mut().ok_or(FormatError::MissingEntry("layer"))?;
    layer.settings = settings;
    Ok(())
}

fn read_c_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds one chunk's on-wire bytes, including the physical padding
    /// byte an odd-sized body carries (unused, but present in the stream).
    fn chunk(ident: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ident.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn wrap_clip_data(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"FORM".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(b"8BIT");
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn decodes_dimensions_and_background() {
        let mut dloc = 128u16.to_be_bytes().to_vec();
        dloc.extend_from_slice(&64u16.to_be_bytes());

        let chunks = vec![
            chunk(b"DLOC", &dloc),
            chunk(b"BGP1", &[10, 20, 30, 255]),
        ];
        let data = wrap_clip_data(&chunks);
        let clip = decode_clip_data(&data, Dict::new()).unwrap();

        assert_eq!(clip.dimensions(), (128, 64));
        assert_eq!(clip.background_color(), (10, 20, 30, 255));
    }

    #[test]
    fn layer_name_then_header_builds_one_layer() {
        let name = b"Background\0".to_vec();
        let settings = vec![0u8; 104];

        let chunks = vec![chunk(b"LNAM", &name), chunk(b"LRHD", &settings)];
        let data = wrap_clip_data(&chunks);
        let mut clip = decode_clip_data(&data, Dict::new()).unwrap();

        assert_eq!(clip.layers().len(), 1);
        assert_eq!(clip.layers()[0].name, "Background");
    }

    #[test]
    fn lrsr_without_lrsh_is_orphan_error() {
        let chunks = vec![chunk(b"LRSR", &[])];
        let data = wrap_clip_data(&chunks);
        assert!(matches!(decode_clip_data(&data, Dict::new()), Err(FormatError::OrphanLrsr)));
    }

    #[test]
    fn lrsr_inherits_name_and_settings_as_ctg_layer() {
        let name = b"Ink\0\0".to_vec();
        let mut settings = vec![0u8; 104];
        settings[14] = 0;
        settings[15] = 0b1; // visible

        let chunks = vec![
            chunk(b"LNAM", &name),
            chunk(b"LRSH", &settings),
            chunk(b"LRSR", &[]),
        ];
        let data = wrap_clip_data(&chunks);
        let mut clip = decode_clip_data(&data, Dict::new()).unwrap();

        assert_eq!(clip.layers().len(), 2);
        assert!(clip.layers()[1].is_ctg);
        assert_eq!(clip.layers()[1].name, "Ink");
        assert!(clip.layers()[1].settings.visible);
    }

    #[test]
    fn second_lrsr_without_its_own_lrsh_is_orphan_error() {
        let name = b"Ink\0\0".to_vec();
        let settings = vec![0u8; 104];

        let chunks = vec![
            chunk(b"LNAM", &name),
            chunk(b"LRSH", &settings),
            chunk(b"LRSR", &[]),
            chunk(b"LRSR", &[]),
        ];
        let data = wrap_clip_data(&chunks);
        assert!(matches!(decode_clip_data(&data, Dict::new()), Err(FormatError::OrphanLrsr)));
    }

    #[test]
    fn odd_size_chunk_is_padded_before_next_chunk() {
        let name = b"A\0".to_vec();
        let odd_body = vec![0xAAu8; 7];

        let chunks = vec![chunk(b"XSHT", &odd_body), chunk(b"LNAM", &name)];
        let data = wrap_clip_data(&chunks);
        let mut clip = decode_clip_data(&data, Dict::new()).unwrap();

        assert_eq!(clip.layers().len(), 1);
        assert_eq!(clip.layers()[0].name, "A");
    }

    #[test]
    fn unknown_ident_between_known_chunks_is_tolerated() {
        let name = b"A\0".to_vec();
        let chunks = vec![chunk(b"ZZZZ", b"???"), chunk(b"LNAM", &name)];
        let data = wrap_clip_data(&chunks);

        let mut clip = decode_clip_data(&data, Dict::new()).unwrap();
        assert_eq!(clip.layers().len(), 1);
        assert_eq!(clip.layers()[0].name, "A");
    }
}
