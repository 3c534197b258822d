//! Typed representation of an image (`DBOD` full-raster or `SRAW` tiled)
//! and its tiles, with lazy decode state per §9's `Loaded | Raw | Compressed`
//! pattern.

pub(crate) mod resolve;

use crate::{binreader::ByteReader, error::FormatError, rle, zchk};

pub(crate) const TILE_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageKind {
    Zchk,
    Dbod,
    Sraw,
}

impl ImageKind {
    fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"ZCHK" => Some(ImageKind::Zchk),
            b"DBOD" => Some(ImageKind::Dbod),
            b"SRAW" => Some(ImageKind::Sraw),
            _ => None,
        }
    }
}

/// Raw bytes behind an image, lazily replaced by their decompressed form
/// the first time a `ZCHK` image is touched.
enum Body {
    Compressed(Vec<u8>),
    Plain(Vec<u8>),
}

pub(crate) enum TileKind {
    Raw,
    Rle,
    Cpy,
}

pub(crate) struct Tile {
    pub(crate) index: usize,
    pub(crate) kind: TileKind,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) rle_bytes: Vec<u8>,
    pub(crate) raw_pixels: Option<Vec<u8>>,
    pub(crate) ref_local: bool,
    pub(crate) lookup_index: usize,
}

/// An image record: a slot in a layer's `images[]`, decoded lazily and
/// memoized in place.
pub(crate) struct Image {
    pub(crate) kind: ImageKind,
    pub(crate) index_in_layer: usize,
    body: Body,
    header_words: Option<[u32; 3]>,
    pub(crate) width: usize,
    pub(crate) height: usize,
    tiles: Option<Vec<Tile>>,
    result: Option<Vec<u8>>,
}

impl Image {
    pub(crate) fn new(kind: ImageKind, index_in_layer: usize, raw: Vec<u8>, width: usize, height: usize) -> Self {
        let body = if kind == ImageKind::Zchk {
            Body::Compressed(raw)
        } else {
            Body::Plain(raw)
        };
        Image {
            kind,
            index_in_layer,
            body,
            header_words: None,
            width,
            height,
            tiles: None,
            result: None,
        }
    }

    /// `first_info`, `second_info`, `third_info`: the first three BE u32s
    /// of the (decompressed) payload.
    pub(crate) fn header_words(&mut self) -> Result<[u32; 3], FormatError> {
        self.materialize()?;
        Ok(self.header_words.expect("materialize populates header_words"))
    }

    pub(crate) fn first_info(&mut self) -> Result<u32, FormatError> {
        self.header_words().map(|w| w[0])
    }

    pub(crate) fn second_info(&mut self) -> Result<u32, FormatError> {
        self.header_words().map(|w| w[1])
    }

    /// Inflates a `ZCHK` body in place, rewriting `kind` to the inner tag.
    /// A no-op on images that are already `DBOD`/`SRAW`.
    fn materialize(&mut self) -> Result<(), FormatError> {
        if matches!(self.body, Body::Compressed(_)) {
            let taken = std::mem::replace(&mut self.body, Body::Plain(Vec::new()));
            let Body::Compressed(bytes) = taken else {
                unreachable!("guarded by the matches! check above");
            };

            let inflated = zchk::inflate(&bytes)?;
            let inner_kind = ImageKind::from_tag(inflated.tag)
                .ok_or(FormatError::UnknownMagic(inflated.tag))?;
            self.kind = inner_kind;
            self.body = Body::Plain(inflated.payload);
        }

        if self.header_words.is_none() {
            let payload = self.plain_bytes();
            if payload.len() >= 12 {
                let mut reader = ByteReader::new(payload);
                let first = reader.read_u32()?;
                let second = reader.read_u32()?;
                let third = reader.read_u32()?;
                self.header_words = Some([first, second, third]);
            } else {
                self.header_words = Some([0, 0, 0]);
            }
        }

        Ok(())
    }

    fn plain_bytes(&self) -> &[u8] {
        match &self.body {
            Body::Plain(bytes) => bytes,
            Body::Compressed(_) => panic!("materialize() must run before plain_bytes()"),
        }
    }

    fn tiles_per_row(&self) -> usize {
        self.width.div_ceil(TILE_SIZE)
    }

    fn tiles_per_col(&self) -> usize {
        self.height.div_ceil(TILE_SIZE)
    }

    fn tile_bounds(&self, index: usize) -> (usize, usize) {
        let per_row = self.tiles_per_row();
        let x = (index % per_row) * TILE_SIZE;
        let y = (index / per_row) * TILE_SIZE;
        let w = (self.width - x).min(TILE_SIZE);
        let h = (self.height - y).min(TILE_SIZE);
        (w, h)
    }

    /// Splits the image into its tile grid on first access, memoizing the
    /// result. `DBOD` images fully decode their RLE payload and crop it
    /// into RAW tiles; `SRAW` images parse their own tile table (§4.6).
    pub(crate) fn tiles(&mut self) -> Result<&[Tile], FormatError> {
        self.materialize()?;

        if self.tiles.is_none() {
            let tiles = match self.kind {
                ImageKind::Dbod => self.build_dbod_tiles()?,
                ImageKind::Sraw => self.build_sraw_tiles()?,
                ImageKind::Zchk => unreachable!("materialize() resolves ZCHK away"),
            };
            self.tiles = Some(tiles);
        }

        Ok(self.tiles.as_deref().unwrap())
    }

    fn build_dbod_tiles(&self) -> Result<Vec<Tile>, FormatError> {
        // RLE decoding runs over the payload from byte 0, the same bytes
        // `header_words()` independently reinterprets as first/second/third
        // info; the two reads overlap rather than one consuming past the
        // other's range.
        let payload = self.plain_bytes();
        let pixels = rle::decode(payload, self.width, self.height)?;

        let per_row = self.tiles_per_row();
        let num_tiles = per_row * self.tiles_per_col();
        let stride = self.width * 4;

        let mut tiles = Vec::with_capacity(num_tiles);
        for index in 0..num_tiles {
            let (w, h) = self.tile_bounds(index);
            let x = (index % per_row) * TILE_SIZE;
            let y = (index / per_row) * TILE_SIZE;

            let mut block = Vec::with_capacity(w * h * 4);
            for row in 0..h {
                let row_start = (y + row) * stride + x * 4;
                block.extend_from_slice(&pixels[row_start..row_start + w * 4]);
            }

            tiles.push(Tile {
                index,
                kind: TileKind::Raw,
                width: w,
                height: h,
                rle_bytes: Vec::new(),
                raw_pixels: Some(block),
                ref_local: false,
                lookup_index: 0,
            });
        }

        Ok(tiles)
    }

    fn build_sraw_tiles(&self) -> Result<Vec<Tile>, FormatError> {
        // Same overlap as build_dbod_tiles: the tile table starts at byte 0.
        let payload = self.plain_bytes();
        let mut reader = ByteReader::new(payload);

        reader.skip(4)?; // advisory tile dimension
        let thumb_size = reader.read_u32()? as usize;
        reader.skip(thumb_size)?;
        let tile_amount = reader.read_u32()? as usize;

        let mut tiles = Vec::with_capacity(tile_amount);
        for index in 0..tile_amount {
            let (w, h) = self.tile_bounds(index);
            let magic = reader.read_u32()?;

            let tile = if magic == 0 {
                let word = reader.read_u32()?;
                let lookup_index = reader.read_u32()? as usize;
                Tile {
                    index,
                    kind: TileKind::Cpy,
                    width: w,
                    height: h,
                    rle_bytes: Vec::new(),
                    raw_pixels: None,
                    ref_local: word == 0,
                    lookup_index,
                }
            } else {
                let rle_bytes = reader.read_bytes(magic as usize)?.to_vec();
                Tile {
                    index,
                    kind: TileKind::Rle,
                    width: w,
                    height: h,
                    rle_bytes,
                    raw_pixels: None,
                    ref_local: false,
                    lookup_index: 0,
                }
            };

            tiles.push(tile);
        }

        Ok(tiles)
    }

    pub(crate) fn cached_result(&self) -> Option<&[u8]> {
        self.result.as_deref()
    }

    pub(crate) fn set_result(&mut self, result: Vec<u8>) {
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbod_payload(width: usize, height: usize, color: [u8; 4]) -> Vec<u8> {
        // The RLE stream starts at byte 0; `header_words()` reads its own
        // (overlapping) view of the same leading bytes independently.
        let pixels: Vec<u8> = color.iter().cloned().cycle().take(width * height * 4).collect();
        rle::encode(&pixels)
    }

    #[test]
    fn dbod_tile_grid_covers_every_pixel_exactly_once() {
        // 65 wide needs 2 columns of tiles (64 + 1); 64 tall needs exactly 1 row.
        let width = 65;
        let height = 64;
        let raw = dbod_payload(width, height, [1, 2, 3, 4]);
        let mut image = Image::new(ImageKind::Dbod, 0, raw, width, height);

        let tiles = image.tiles().unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].width, 64);
        assert_eq!(tiles[1].width, 1); // cropped right-edge tile
        assert_eq!(tiles[0].height, 64);
        assert_eq!(tiles[1].height, 64);

        let total_pixels: usize = tiles.iter().map(|t| t.width * t.height).sum();
        assert_eq!(total_pixels, width * height);
    }

    #[test]
    fn zchk_materialize_rewrites_kind_to_inner_tag() {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let inner = dbod_payload(4, 4, [9, 9, 9, 255]);
        let mut tagged = b"DBOD".to_vec();
        tagged.extend_from_slice(&(inner.len() as u32).to_be_bytes());
        tagged.extend_from_slice(&inner);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tagged).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut zchk_blob = vec![0u8; 16];
        zchk_blob.extend_from_slice(&1u32.to_be_bytes());
        zchk_blob.extend_from_slice(&[0; 4]);
        zchk_blob.extend_from_slice(&(tagged.len() as u32).to_be_bytes());
        zchk_blob.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        zchk_blob.extend_from_slice(&compressed);

        let mut image = Image::new(ImageKind::Zchk, 0, zchk_blob, 4, 4);
        image.header_words().unwrap();

        assert_eq!(image.kind, ImageKind::Dbod);
    }

    #[test]
    fn sraw_cpy_tile_carries_ref_local_and_lookup_index() {
        let mut payload = 64u32.to_be_bytes().to_vec(); // advisory tile size
        payload.extend_from_slice(&0u32.to_be_bytes()); // thumb size 0
        payload.extend_from_slice(&1u32.to_be_bytes()); // tile_amount
        payload.extend_from_slice(&0u32.to_be_bytes()); // magic == 0 -> CPY
        payload.extend_from_slice(&0u32.to_be_bytes()); // word == 0 -> ref_local = true
        payload.extend_from_slice(&3u32.to_be_bytes()); // lookup_index

        let mut image = Image::new(ImageKind::Sraw, 1, payload, 64, 64);
        let tiles = image.tiles().unwrap();

        assert_eq!(tiles.len(), 1);
        assert!(matches!(tiles[0].kind, TileKind::Cpy));
        assert!(tiles[0].ref_local);
        assert_eq!(tiles[0].lookup_index, 3);
    }
}
