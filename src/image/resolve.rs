//! The tile-reference resolver: the component that actually materializes
//! an RGBA raster for a requested image, chasing image-level redirection
//! (`first_info ∈ {2, 6}`) and per-tile `CPY` references (intra-image or
//! cross-image) to a concrete pixel source.

use super::{Image, ImageKind, TileKind, TILE_SIZE};
use crate::{error::FormatError, rle};
use std::collections::HashSet;

/// Follows the image-redirection chain (§4.7 step 1) starting at `index`
/// until it lands on a `DBOD` image or a `first_info` outside `{2, 6}`.
/// Bounded by `images.len()` steps; a longer chain is a malformed cycle.
fn resolve_redirect(images: &mut [Image], mut index: usize) -> Result<usize, FormatError> {
    for _ in 0..=images.len() {
        // Force materialization so `kind` reflects the inflated tag rather
        // than the pre-decode `ZCHK` placeholder.
        images[index].header_words()?;
        if images[index].kind == ImageKind::Dbod {
            return Ok(index);
        }

        match images[index].first_info()? {
            2 => {
                let second_info = images[index].second_info()? as usize;
                if second_info >= images.len() {
                    return Err(FormatError::OutOfRange { index: second_info as u32, len: images.len() });
                }
                index = second_info;
            }
            6 => {
                if index == 0 {
                    return Err(FormatError::OutOfRange { index: 0, len: images.len() });
                }
                index -= 1;
            }
            _ => return Ok(index),
        }
    }
    Err(FormatError::ImageRedirectCycle)
}

/// `prev_image(I)`: the image one step earlier in the redirection sense,
/// used when a `CPY` tile needs "the previous image" rather than a jump
/// target. `first_info == 64` is treated as equivalent to `6` per the
/// documented ambiguity in the original source.
fn prev_image_index(images: &mut [Image], image_index: usize) -> Result<usize, FormatError> {
    let first_info = images[image_index].first_info()?;
    match first_info {
        2 => {
            let second_info = images[image_index].second_info()? as usize;
            if second_info >= images.len() {
                return Err(FormatError::OutOfRange { index: second_info as u32, len: images.len() });
            }
            Ok(second_info)
        }
        6 | 64 => {
            if image_index == 0 {
                return Err(FormatError::OutOfRange { index: 0, len: images.len() });
            }
            Ok(image_index - 1)
        }
        other => Err(FormatError::UnknownFirstInfo(other)),
    }
}

enum Action {
    Pixels(Vec<u8>),
    Rle { bytes: Vec<u8>, width: usize, height: usize },
    CpyLocal { lookup_index: usize },
    CpyCross,
}

/// Resolves a single tile into its RGBA pixel block, recursing across
/// images for `CPY` references. `visited` detects cycles: each
/// `(image_index, tile_index)` pair may only be entered once per
/// top-level resolution.
fn resolve_tile(
    images: &mut [Image],
    image_index: usize,
    tile_index: usize,
    visited: &mut HashSet<(usize, usize)>,
) -> Result<Vec<u8>, FormatError> {
    if !visited.insert((image_index, tile_index)) {
        return Err(FormatError::ImageRedirectCycle);
    }

    let tiles = images[image_index].tiles()?;
    let tile = tiles.get(tile_index).ok_or(FormatError::OutOfRange {
        index: tile_index as u32,
        len: tiles.len(),
    })?;

    let action = match tile.kind {
        TileKind::Raw => Action::Pixels(tile.raw_pixels.clone().expect("RAW tile always carries pixels")),
        TileKind::Rle => Action::Rle {
            bytes: tile.rle_bytes.clone(),
            width: tile.width,
            height: tile.height,
        },
        TileKind::Cpy if tile.ref_local => Action::CpyLocal { lookup_index: tile.lookup_index },
        TileKind::Cpy => Action::CpyCross,
    };

    match action {
        Action::Pixels(pixels) => Ok(pixels),
        Action::Rle { bytes, width, height } => rle::decode(&bytes, width, height),
        Action::CpyLocal { lookup_index } => {
            // §4.7: ascending composition order only holds if a local copy
            // always points at an earlier tile in the same image.
            debug_assert!(
                lookup_index < tile_index,
                "local CPY reference must point to an earlier tile index"
            );

            let referenced_is_cpy = {
                let tiles = images[image_index].tiles()?;
                let referenced = tiles.get(lookup_index).ok_or(FormatError::OutOfRange {
                    index: lookup_index as u32,
                    len: tiles.len(),
                })?;
                matches!(referenced.kind, TileKind::Cpy)
            };

            if referenced_is_cpy {
                let prev_index = prev_image_index(images, image_index)?;
                resolve_tile(images, prev_index, lookup_index, visited)
            } else {
                resolve_tile(images, image_index, lookup_index, visited)
            }
        }
        Action::CpyCross => {
            let prev_index = prev_image_index(images, image_index)?;
            resolve_tile(images, prev_index, tile_index, visited)
        }
    }
}

fn tile_origin(index: usize, tiles_per_row: usize) -> (usize, usize) {
    ((index % tiles_per_row) * TILE_SIZE, (index / tiles_per_row) * TILE_SIZE)
}

fn blit(result: &mut [u8], canvas_width: usize, block: &[u8], x: usize, y: usize, width: usize, height: usize) {
    let stride = canvas_width * 4;
    for row in 0..height {
        let dst = (y + row) * stride + x * 4;
        let src = row * width * 4;
        result[dst..dst + width * 4].copy_from_slice(&block[src..src + width * 4]);
    }
}

/// Materializes the full `width × height × 4` RGBA raster for the image at
/// `index`, memoizing the result on the redirect chain's terminal image.
pub(crate) fn construct_image(
    images: &mut [Image],
    index: usize,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, FormatError> {
    let resolved_index = resolve_redirect(images, index)?;

    if let Some(cached) = images[resolved_index].cached_result() {
        return Ok(cached.to_vec());
    }

    let mut result = vec![0u8; width * height * 4];
    let tiles_per_row = width.div_ceil(TILE_SIZE);
    let tile_count = images[resolved_index].tiles()?.len();

    for tile_index in 0..tile_count {
        let mut visited = HashSet::new();
        let block = resolve_tile(images, resolved_index, tile_index, &mut visited)?;

        let (tile_width, tile_height) = {
            let tile = &images[resolved_index].tiles()?[tile_index];
            (tile.width, tile.height)
        };
        let (x, y) = tile_origin(tile_index, tiles_per_row);
        blit(&mut result, width, &block, x, y, tile_width, tile_height);
    }

    images[resolved_index].set_result(result.clone());
    Ok(result)
}
