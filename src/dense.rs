//! Dense representation of a single model - a 3D grid of palette indices.
//!
//! Decoded with [`DecodePolicy::selective`], so scene graph chunks are never
//! materialized and only the first `SIZE`, `XYZI` and `RGBA` chunks count.

use std::{ops::Index, path::Path};

use anyhow::Context;
use log::warn;

use crate::{
    semantic::Model,
    syntax::{self, Budget, Chunk, ChunkId, ChunkKind, Color, DecodePolicy, Limits, Size, PALETTE_LEN},
    Result, VoxError,
};

pub type Rgb = [u8; 3];

/// Palette used when a file has no `RGBA` chunk.
pub const DEFAULT_PALETTE: [Rgb; PALETTE_LEN] = [Color::WHITE.rgb(); PALETTE_LEN];

/// Palette indices laid out x-major, then y, then z. Index 0 is empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    size: Size,
    cells: Vec<u8>,
}

impl Grid {
    fn zeroed(size: Size, budget: &mut Budget) -> Result<Self> {
        let volume = size.volume().unwrap_or(usize::MAX);
        budget.claim(volume)?;
        Ok(Grid { size, cells: vec![0; volume] })
    }

    /// Fills a grid from a sparse model. Later voxels overwrite earlier ones
    /// at the same position; voxels outside the model's size are dropped.
    pub fn from_model(model: &Model) -> Result<Self> {
        let mut budget = Budget::new(Limits::default().max_alloc_bytes, 0);
        Grid::fill(model.size, &model.voxels, &mut budget)
    }

    fn fill(size: Size, voxels: &[syntax::Voxel], budget: &mut Budget) -> Result<Self> {
        let mut grid = Grid::zeroed(size, budget)?;
        for voxel in voxels {
            let [x, y, z] = voxel.pos;
            if !grid.set(x as u32, y as u32, z as u32, voxel.index) {
                warn!("voxel {:?} lies outside a {:?} grid", voxel, size);
            }
        }
        Ok(grid)
    }

    fn offset(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.size.x || y >= self.size.y || z >= self.size.z {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        Some((x * self.size.y as usize + y) * self.size.z as usize + z)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<u8> {
        self.offset(x, y, z).map(|offset| self.cells[offset])
    }

    /// Returns false and leaves the grid untouched if the position is outside it.
    pub fn set(&mut self, x: u32, y: u32, z: u32, index: u8) -> bool {
        match self.offset(x, y, z) {
            Some(offset) => {
                self.cells[offset] = index;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }

    /// Non-empty cells as `([x, y, z], index)`.
    pub fn iter_filled(&self) -> impl Iterator<Item = ([u32; 3], u8)> + '_ {
        let (size_y, size_z) = (self.size.y as usize, self.size.z as usize);
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &index)| index != 0)
            .map(move |(offset, &index)| {
                let z = offset % size_z;
                let y = offset / size_z % size_y;
                let x = offset / size_z / size_y;
                ([x as u32, y as u32, z as u32], index)
            })
    }
}

impl Index<[usize; 3]> for Grid {
    type Output = u8;

    fn index(&self, [x, y, z]: [usize; 3]) -> &u8 {
        assert!(
            x < self.size.x as usize && y < self.size.y as usize && z < self.size.z as usize,
            "position {:?} outside grid of {:?}",
            [x, y, z],
            self.size
        );
        &self.cells[(x * self.size.y as usize + y) * self.size.z as usize + z]
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("size", &self.size)
            .field("filled", &self.cells.iter().filter(|&&index| index != 0).count())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoxModel {
    pub grid: Grid,
    /// All 256 colors of the `RGBA` chunk without alpha, or [`DEFAULT_PALETTE`].
    pub palette: Vec<Rgb>,
}

impl VoxModel {
    pub fn size(&self) -> Size {
        self.grid.size()
    }

    pub fn to_dense(&self) -> &Grid {
        &self.grid
    }

    /// Builds the model from the direct children of `main`.
    pub fn from_main(main: &Chunk<'_>, limits: Limits) -> Result<Self> {
        VoxModel::assemble(main, &mut Budget::new(limits.max_alloc_bytes, 0))
    }

    fn assemble(main: &Chunk<'_>, budget: &mut Budget) -> Result<Self> {
        let size = first_of(main, ChunkId::SIZE, |kind| match kind {
            ChunkKind::Size(size) => Some(*size),
            _ => None,
        })
        .ok_or(VoxError::MissingChunk { id: ChunkId::SIZE })?;
        let voxels = first_of(main, ChunkId::XYZI, |kind| match kind {
            ChunkKind::Voxels(voxels) => Some(voxels.as_slice()),
            _ => None,
        })
        .ok_or(VoxError::MissingChunk { id: ChunkId::XYZI })?;
        let colors: Option<&[Color]> = first_of(main, ChunkId::RGBA, |kind| match kind {
            ChunkKind::Colors(colors) => Some(colors.as_slice()),
            _ => None,
        });

        let grid = Grid::fill(size, voxels, budget)?;
        let palette = match colors {
            Some(colors) => colors.iter().map(|color| color.rgb()).collect(),
            None => DEFAULT_PALETTE.to_vec(),
        };
        Ok(VoxModel { grid, palette })
    }
}

fn first_of<'c, T>(
    main: &'c Chunk<'_>,
    id: ChunkId,
    extract: impl Fn(&'c ChunkKind) -> Option<T>,
) -> Option<T> {
    let mut found = main.children_of(id);
    let first = found.next()?;
    let extra = found.count();
    if extra > 0 {
        warn!("ignoring {} extra {:?} chunks", extra, id);
    }
    extract(&first.kind)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<VoxModel> {
    parse_bytes_with(bytes, &DecodePolicy::selective())
}

pub fn parse_bytes_with(bytes: &[u8], policy: &DecodePolicy) -> Result<VoxModel> {
    let file = syntax::VoxFile::parse(bytes, policy)?;
    let mut budget = Budget::new(policy.limits.max_alloc_bytes, file.allocated);
    VoxModel::assemble(file.main_chunk()?, &mut budget)
}

pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<VoxModel> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_bytes(&bytes)?)
}
