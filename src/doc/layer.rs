//! Layer records: settings derived from `LRHD`, and the `frame(i)`
//! operation that is the public entry point into the tile resolver.

use crate::{
    error::FormatError,
    image::{resolve, Image},
};

/// Settings decoded from a 104-byte `LRHD`/`LRSH` body, interpreted as 52
/// big-endian u16 words.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerSettings {
    pub start_frame: i32,
    pub end_frame: i32,
    pub num_images: u16,
    pub transparency: u16,
    pub visible: bool,
    pub locked: bool,
    pub blend_mode: u16,
}

const LRHD_WORD_COUNT: usize = 52;

impl LayerSettings {
    /// Parses the fixed 52-word `LRHD`/`LRSH` layout (§3: word indices are
    /// 0-based into the big-endian u16 array).
    pub(crate) fn parse(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < LRHD_WORD_COUNT * 2 {
            return Err(FormatError::TruncatedChunk {
                needed: LRHD_WORD_COUNT * 2,
                available: data.len(),
            });
        }

        let word = |i: usize| u16::from_be_bytes([data[i * 2], data[i * 2 + 1]]);

        Ok(LayerSettings {
            start_frame: word(3) as i32,
            end_frame: word(5) as i32,
            num_images: word(7),
            transparency: word(9),
            visible: word(15) & 0b1 != 0,
            locked: word(15) & 0b1_0000 != 0,
            blend_mode: word(30),
        })
    }
}

/// A decoded layer: a name, its settings, and the sequence of images that
/// make up its timeline.
pub struct Layer {
    pub name: String,
    pub is_ctg: bool,
    pub settings: LayerSettings,
    pub(crate) images: Vec<Image>,
}

impl Layer {
    pub(crate) fn new(name: String, settings: LayerSettings, is_ctg: bool) -> Self {
        Layer { name, is_ctg, settings, images: Vec::new() }
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    /// Reconstructs the RGBA raster for absolute frame `frame_index`. A
    /// frame index outside `[start_frame, start_frame + images.len())` is
    /// not an error: it returns a fully zero, transparent raster of the
    /// layer's dimensions.
    pub fn frame(&mut self, frame_index: i32, width: usize, height: usize) -> Result<Vec<u8>, FormatError> {
        let offset = frame_index - self.settings.start_frame;
        if offset < 0 || offset as usize >= self.images.len() {
            return Ok(vec![0u8; width * height * 4]);
        }

        resolve::construct_image(&mut self.images, offset as usize, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lrhd_bytes(start_frame: u16, end_frame: u16, num_images: u16, visible_locked: u16, blend_mode: u16) -> Vec<u8> {
        let mut words = [0u16; LRHD_WORD_COUNT];
        words[3] = start_frame;
        words[5] = end_frame;
        words[7] = num_images;
        words[15] = visible_locked;
        words[30] = blend_mode;

        let mut out = Vec::with_capacity(LRHD_WORD_COUNT * 2);
        for w in words {
            out.extend_from_slice(&w.to_be_bytes());
        }
        out
    }

    #[test]
    fn parses_fields_at_documented_word_offsets() {
        let data = lrhd_bytes(10, 20, 11, 0b1_0001, 3);
        let settings = LayerSettings::parse(&data).unwrap();

        assert_eq!(settings.start_frame, 10);
        assert_eq!(settings.end_frame, 20);
        assert_eq!(settings.num_images, 11);
        assert!(settings.visible);
        assert!(settings.locked);
        assert_eq!(settings.blend_mode, 3);
    }

    #[test]
    fn visible_and_locked_are_independent_bits() {
        let data = lrhd_bytes(0, 0, 0, 0b0_0000, 0);
        let settings = LayerSettings::parse(&data).unwrap();
        assert!(!settings.visible);
        assert!(!settings.locked);
    }

    #[test]
    fn short_buffer_is_an_error() {
        assert!(matches!(
            LayerSettings::parse(&[0u8; 10]),
            Err(FormatError::TruncatedChunk { .. })
        ));
    }

    #[test]
    fn out_of_range_frame_index_returns_zero_raster() {
        let settings = LayerSettings { start_frame: 5, ..Default::default() };
        let mut layer = Layer::new("bg".into(), settings, false);

        let raster = layer.frame(0, 4, 4).unwrap();
        assert_eq!(raster, vec![0u8; 4 * 4 * 4]);
    }
}
