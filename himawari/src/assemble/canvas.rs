//! Target bitmap and per-cell write regions.

use std::collections::HashMap;

use image::{imageops, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use super::AssembleError;
use crate::coord::{GridCoord, Level};
use crate::tasks::DecodedTile;

const BYTES_PER_PIXEL: usize = 4;

/// Composed image under construction.
///
/// The canvas is `tile_size * level` pixels on each edge. Every grid cell
/// must be written exactly once before [`Canvas::finish`] hands out the
/// image.
pub struct Canvas {
    image: RgbaImage,
    level: Level,
    tile_size: u32,
    written: Vec<bool>,
}

impl Canvas {
    pub fn new(level: Level, tile_size: u32) -> Self {
        let edge = level.image_edge(tile_size);
        Self {
            image: RgbaImage::new(edge, edge),
            level,
            tile_size,
            written: vec![false; level.tile_count()],
        }
    }

    fn index(&self, coord: GridCoord) -> Result<usize, AssembleError> {
        let n = self.level.tiles_per_edge();
        if coord.x >= n || coord.y >= n {
            return Err(AssembleError::OutOfRange {
                coord,
                level: self.level,
            });
        }
        Ok((coord.y * n + coord.x) as usize)
    }

    /// Copies `tile` into its cell, overwriting the region completely.
    pub fn place(&mut self, coord: GridCoord, tile: &RgbaImage) -> Result<(), AssembleError> {
        let index = self.index(coord)?;
        check_dimensions(coord, self.tile_size, tile)?;
        if self.written[index] {
            return Err(AssembleError::AlreadyWritten { coord });
        }

        let (x, y) = coord.pixel_offset(self.tile_size);
        imageops::replace(&mut self.image, tile, x as i64, y as i64);
        self.written[index] = true;
        Ok(())
    }

    /// Splits the canvas into one disjoint write region per cell, row-major.
    ///
    /// Regions borrow the canvas mutably and can be written from different
    /// threads at the same time. Writing a region consumes it.
    pub fn cells(&mut self) -> Vec<CellRegion<'_>> {
        let n = self.level.tiles_per_edge() as usize;
        let tile_size = self.tile_size as usize;
        let segment = tile_size * BYTES_PER_PIXEL;

        let mut rows: Vec<Vec<&mut [u8]>> = (0..n * n)
            .map(|_| Vec::with_capacity(tile_size))
            .collect();

        if segment > 0 {
            let pixels: &mut [u8] = &mut self.image;
            for (py, line) in pixels.chunks_exact_mut(segment * n).enumerate() {
                let cy = py / tile_size;
                for (cx, part) in line.chunks_exact_mut(segment).enumerate() {
                    rows[cy * n + cx].push(part);
                }
            }
        }

        let tile_size = self.tile_size;
        rows.into_iter()
            .zip(self.written.iter_mut())
            .enumerate()
            .map(|(i, (rows, written))| CellRegion {
                coord: GridCoord {
                    x: (i % n) as u32,
                    y: (i / n) as u32,
                },
                tile_size,
                rows,
                written,
            })
            .collect()
    }

    /// Places every tile, in parallel across cells.
    ///
    /// Each coordinate may appear at most once. Tiles are validated before
    /// any pixel is written.
    pub fn assemble(&mut self, tiles: &[DecodedTile]) -> Result<(), AssembleError> {
        let mut by_coord: HashMap<GridCoord, &RgbaImage> = HashMap::with_capacity(tiles.len());
        for tile in tiles {
            let index = self.index(tile.coord)?;
            check_dimensions(tile.coord, self.tile_size, &tile.image)?;
            if self.written[index] || by_coord.insert(tile.coord, &tile.image).is_some() {
                return Err(AssembleError::AlreadyWritten { coord: tile.coord });
            }
        }

        self.cells()
            .into_par_iter()
            .filter_map(|region| {
                by_coord
                    .get(&region.coord())
                    .map(|tile| region.write(tile))
            })
            .collect::<Result<(), AssembleError>>()?;

        debug!(
            level = %self.level,
            tiles = tiles.len(),
            "Tiles assembled"
        );
        Ok(())
    }

    /// Cells not yet written, row-major.
    pub fn missing(&self) -> Vec<GridCoord> {
        self.level
            .coords()
            .zip(&self.written)
            .filter(|(_, written)| !**written)
            .map(|(coord, _)| coord)
            .collect()
    }

    /// Returns the composed image if every cell has been written.
    pub fn finish(self) -> Result<RgbaImage, AssembleError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(AssembleError::Incomplete { missing });
        }
        Ok(self.image)
    }
}

fn check_dimensions(coord: GridCoord, tile_size: u32, tile: &RgbaImage) -> Result<(), AssembleError> {
    let (width, height) = tile.dimensions();
    if width != tile_size || height != tile_size {
        return Err(AssembleError::TileDimensions {
            coord,
            expected: tile_size,
            width,
            height,
        });
    }
    Ok(())
}

/// Exclusive write access to one cell of a [`Canvas`].
pub struct CellRegion<'a> {
    coord: GridCoord,
    tile_size: u32,
    rows: Vec<&'a mut [u8]>,
    written: &'a mut bool,
}

impl CellRegion<'_> {
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    /// Copies `tile` into this cell.
    pub fn write(self, tile: &RgbaImage) -> Result<(), AssembleError> {
        check_dimensions(self.coord, self.tile_size, tile)?;
        if *self.written {
            return Err(AssembleError::AlreadyWritten { coord: self.coord });
        }

        let segment = self.tile_size as usize * BYTES_PER_PIXEL;
        for (dst, src) in self.rows.into_iter().zip(tile.as_raw().chunks_exact(segment)) {
            dst.copy_from_slice(src);
        }
        *self.written = true;
        Ok(())
    }
}
