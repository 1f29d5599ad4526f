//! Sparse representation of a MagicaVoxel file - models as voxel lists, plus palette and materials.
//!
//! Models are built by pairing the `SIZE` and `XYZI` children of the main chunk by position.

use std::{convert::TryFrom, path::Path};

use anyhow::Context;
use log::{debug, warn};

use crate::{
    syntax::{self, Chunk, ChunkKind, DecodePolicy},
    Result, VoxError,
};

pub use syntax::{Color, Material, MaterialKind, MaterialProperty, Size, Voxel};

/// Palette entries kept from an `RGBA` chunk. The last stored color has no palette index.
pub const STORED_PALETTE_LEN: usize = syntax::PALETTE_LEN - 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub size: Size,
    pub voxels: Vec<Voxel>,
}

impl Model {
    pub fn new(size: Size, voxels: Vec<Voxel>) -> Self {
        Model { size, voxels }
    }
}

/// Order in which the children of the main chunk are visited.
///
/// Decides the order of models and materials in [`Vox`], and which `PACK`
/// and `RGBA` chunk wins when there are several (the last one visited).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyOrder {
    FileOrder,
    Reversed,
}

impl Default for AssemblyOrder {
    fn default() -> Self {
        AssemblyOrder::FileOrder
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vox {
    pub models: Vec<Model>,
    /// The first 255 colors of the `RGBA` chunk, as stored. See [`Vox::color`].
    pub palette: Option<Vec<Color>>,
    pub materials: Vec<Material>,
    /// Model count from the `PACK` chunk, 1 when there is none.
    pub declared_models: u32,
}

impl Vox {
    /// The color for a voxel's palette index.
    ///
    /// Index 0 is empty; index `i` is stored color `i - 1`.
    pub fn color(&self, index: u8) -> Option<Color> {
        let palette = self.palette.as_ref()?;
        match index {
            0 => None,
            i => palette.get(i as usize - 1).copied(),
        }
    }

    /// Builds models from the direct children of `main`.
    pub fn from_main(main: &Chunk<'_>, order: AssemblyOrder) -> Result<Self> {
        let mut children: Vec<&Chunk<'_>> = main.children.iter().collect();
        if order == AssemblyOrder::Reversed {
            children.reverse();
        }

        let mut declared_models = 1;
        let mut palette = None;
        let mut sizes = Vec::new();
        let mut voxel_lists = Vec::new();
        let mut materials = Vec::new();
        for chunk in children {
            match &chunk.kind {
                ChunkKind::Pack(n) => declared_models = *n,
                ChunkKind::Colors(colors) => {
                    palette = Some(colors.iter().take(STORED_PALETTE_LEN).copied().collect())
                }
                ChunkKind::Size(size) => sizes.push(*size),
                ChunkKind::Voxels(voxels) => voxel_lists.push(voxels),
                ChunkKind::OldMaterial(material) => materials.push(material.clone()),
                _ => {}
            }
        }
        debug!("file has {} models", declared_models);

        if sizes.len() != voxel_lists.len() {
            return Err(VoxError::MismatchedChunkCount { sizes: sizes.len(), voxels: voxel_lists.len() });
        }
        let models: Vec<Model> = sizes
            .into_iter()
            .zip(voxel_lists)
            .map(|(size, voxels)| Model::new(size, voxels.clone()))
            .collect();
        if models.len() != declared_models as usize {
            warn!("PACK declares {} models, found {}", declared_models, models.len());
        }

        Ok(Vox { models, palette, materials, declared_models })
    }
}

impl TryFrom<&syntax::VoxFile<'_>> for Vox {
    type Error = VoxError;

    fn try_from(syntax: &syntax::VoxFile<'_>) -> Result<Self> {
        Vox::from_main(syntax.main_chunk()?, AssemblyOrder::default())
    }
}

pub fn parse_bytes(bytes: &[u8]) -> Result<Vox> {
    parse_bytes_with(bytes, &DecodePolicy::full(), AssemblyOrder::default())
}

pub fn parse_bytes_with(bytes: &[u8], policy: &DecodePolicy, order: AssemblyOrder) -> Result<Vox> {
    let file = syntax::VoxFile::parse(bytes, policy)?;
    Vox::from_main(file.main_chunk()?, order)
}

pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vox> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_bytes(&bytes)?)
}
