//! Syntaxical representation of MagicaVoxel file - a tree of chunks.
//!
//! Each chunk is a 4 byte id, the length of its content, the length of all
//! its children, then the content and the children themselves. In newer
//! versions of MagicaVoxel, only the main chunk has children.
//!
//! The same recursive descent serves two decoding policies, see [`DecodePolicy`].
use std::fmt::{self, Formatter};

use indexmap::IndexMap;
use log::{debug, warn};
use nom::{
    combinator::map,
    multi::count,
    number::complete::{le_f32, le_i32, le_u32},
    sequence::tuple,
    IResult,
};

use crate::{
    cursor::{four_bytes, Cursor},
    Result, VoxError,
};

const MAGIC: ChunkId = ChunkId(*b"VOX ");
/// Bytes taken by a chunk's id, content length and children length.
pub const CHUNK_HEADER_LEN: usize = 12;
pub const PALETTE_LEN: usize = 256;

/// A voxel represented by a position and index into the palette array.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Voxel {
    pub pos: [u8; 3],
    pub index: u8,
}

impl Voxel {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        map(four_bytes, |[x, y, z, index]| Voxel { pos: [x, y, z], index })(i)
    }
}

impl fmt::Debug for Voxel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:03},{:03},{:03}:{:03}", self.pos[0], self.pos[1], self.pos[2], self.index)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const WHITE: Color = Color { red: 255, green: 255, blue: 255, alpha: 255 };

    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        map(four_bytes, |[red, green, blue, alpha]| Color { red, green, blue, alpha })(i)
    }

    pub const fn rgb(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.red, self.green, self.blue, self.alpha)
    }
}

/// Extents of a model along each axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Size {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Size { x, y, z }
    }

    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        map(tuple((le_u32, le_u32, le_u32)), |(x, y, z)| Size { x, y, z })(i)
    }

    /// Number of cells in a grid of this size, `None` on overflow.
    pub fn volume(self) -> Option<usize> {
        (self.x as usize)
            .checked_mul(self.y as usize)?
            .checked_mul(self.z as usize)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    pub const MAIN: ChunkId = ChunkId(*b"MAIN");
    pub const PACK: ChunkId = ChunkId(*b"PACK");
    pub const SIZE: ChunkId = ChunkId(*b"SIZE");
    pub const XYZI: ChunkId = ChunkId(*b"XYZI");
    pub const RGBA: ChunkId = ChunkId(*b"RGBA");
    pub const MATT: ChunkId = ChunkId(*b"MATT");
    pub const NOTE: ChunkId = ChunkId(*b"NOTE");
    pub const NODE_TRANSFORM: ChunkId = ChunkId(*b"nTRN");
    pub const NODE_GROUP: ChunkId = ChunkId(*b"nGRP");
    pub const NODE_SHAPE: ChunkId = ChunkId(*b"nSHP");

    pub(crate) fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        map(four_bytes, ChunkId)(i)
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Optional float properties of a legacy material, in flag bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialProperty {
    Plastic,
    Roughness,
    Specular,
    Ior,
    Attenuation,
    Power,
    Glow,
}

impl MaterialProperty {
    pub const ALL: [MaterialProperty; 7] = [
        MaterialProperty::Plastic,
        MaterialProperty::Roughness,
        MaterialProperty::Specular,
        MaterialProperty::Ior,
        MaterialProperty::Attenuation,
        MaterialProperty::Power,
        MaterialProperty::Glow,
    ];

    pub fn bit(self) -> u32 {
        1 << self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            MaterialProperty::Plastic => "plastic",
            MaterialProperty::Roughness => "roughness",
            MaterialProperty::Specular => "specular",
            MaterialProperty::Ior => "IOR",
            MaterialProperty::Attenuation => "attenuation",
            MaterialProperty::Power => "power",
            MaterialProperty::Glow => "glow",
        }
    }
}

impl fmt::Display for MaterialProperty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flag bit 7. Marks `power` as total power; it carries no float of its own.
pub const TOTAL_POWER_BIT: u32 = 1 << 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Diffuse,
    Metal,
    Glass,
    Emissive,
}

/// A legacy `MATT` material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: i32,
    pub kind: i32,
    pub weight: f32,
    pub flags: u32,
    pub properties: IndexMap<MaterialProperty, f32>,
}

impl Material {
    fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let (id, kind, weight, flags) = cursor.read(16, tuple((le_i32, le_i32, le_f32, le_u32)))?;
        let mut properties = IndexMap::new();
        for &property in MaterialProperty::ALL.iter() {
            if flags & property.bit() != 0 {
                properties.insert(property, cursor.read_f32()?);
            }
        }
        Ok(Material { id, kind, weight, flags, properties })
    }

    pub fn get(&self, property: MaterialProperty) -> Option<f32> {
        self.properties.get(&property).copied()
    }

    /// Looks a property up by its file format name, e.g. `"roughness"`.
    pub fn get_named(&self, name: &str) -> Option<f32> {
        self.properties
            .iter()
            .find(|(property, _)| property.name() == name)
            .map(|(_, &value)| value)
    }

    pub fn is_total_power(&self) -> bool {
        self.flags & TOTAL_POWER_BIT != 0
    }

    /// `None` for a type number MagicaVoxel never wrote.
    pub fn material_kind(&self) -> Option<MaterialKind> {
        match self.kind {
            0 => Some(MaterialKind::Diffuse),
            1 => Some(MaterialKind::Metal),
            2 => Some(MaterialKind::Glass),
            3 => Some(MaterialKind::Emissive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkKind {
    Main,
    Pack(u32),
    Size(Size),
    Voxels(Vec<Voxel>),
    Colors(Vec<Color>),
    OldMaterial(Material),
    /// A chunk this crate does not interpret; its content is left raw.
    Opaque,
}

impl ChunkKind {
    fn parse(id: ChunkId, content: &[u8], base: usize, budget: &mut Budget) -> Result<Self> {
        let mut cursor = Cursor::with_base(content, base);
        let kind = match id {
            ChunkId::MAIN => {
                if !content.is_empty() {
                    return Err(VoxError::MalformedChunk {
                        id,
                        offset: base,
                        reason: "main chunk has content",
                    });
                }
                ChunkKind::Main
            }
            ChunkId::PACK => ChunkKind::Pack(cursor.read_u32()?),
            ChunkId::SIZE => ChunkKind::Size(cursor.read(12, Size::parse)?),
            ChunkId::XYZI => {
                let n = cursor.read_u32()? as usize;
                debug!("XYZI chunk with {} voxels (len {})", n, content.len());
                let width = n.saturating_mul(4);
                cursor.ensure(width)?;
                budget.claim(width)?;
                ChunkKind::Voxels(cursor.read(width, count(Voxel::parse, n))?)
            }
            ChunkId::RGBA => {
                let width = PALETTE_LEN * 4;
                cursor.ensure(width)?;
                budget.claim(width)?;
                ChunkKind::Colors(cursor.read(width, count(Color::parse, PALETTE_LEN))?)
            }
            ChunkId::MATT => ChunkKind::OldMaterial(Material::parse(&mut cursor)?),
            _ => return Ok(ChunkKind::Opaque),
        };
        if !cursor.is_empty() {
            warn!("{} trailing bytes in chunk {:?} at offset {}", cursor.remaining(), id, base);
        }
        Ok(kind)
    }
}

#[derive(Clone, PartialEq)]
pub struct Chunk<'a> {
    pub id: ChunkId,
    /// Raw content, borrowed from the decoded buffer.
    pub content: &'a [u8],
    /// Declared length of all children, including any that were skipped.
    pub children_len: u32,
    pub kind: ChunkKind,
    pub children: Vec<Chunk<'a>>,
}

impl<'a> Chunk<'a> {
    /// Number of bytes this chunk occupied in the buffer.
    pub fn byte_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.content.len() + self.children_len as usize
    }

    /// First direct child with the given id.
    pub fn find(&self, id: ChunkId) -> Option<&Chunk<'a>> {
        self.children.iter().find(|child| child.id == id)
    }

    /// All direct children with the given id, in file order.
    pub fn children_of(&self, id: ChunkId) -> impl Iterator<Item = &Chunk<'a>> {
        self.children.iter().filter(move |child| child.id == id)
    }
}

impl fmt::Debug for Chunk<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.id, self.kind)?;
        if !self.children.is_empty() {
            f.write_str(":\n")?;
            f.debug_list().entries(self.children.iter()).finish()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    AtMost(u32),
    OneOf(&'static [u32]),
}

impl VersionPolicy {
    pub fn accepts(self, version: u32) -> bool {
        match self {
            VersionPolicy::AtMost(max) => version <= max,
            VersionPolicy::OneOf(versions) => versions.contains(&version),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPolicy {
    /// Exactly one root chunk, which must be `MAIN`.
    Single,
    /// Root chunks are decoded until the buffer runs out.
    UntilExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    /// Upper bound on bytes allocated for decoded voxels, palettes and grids.
    pub max_alloc_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_depth: 64, max_alloc_bytes: 256 << 20 }
    }
}

/// How the chunk tree decoder treats versions, node chunks and unknown chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePolicy {
    pub versions: VersionPolicy,
    /// Chunks dropped along with their children without being decoded.
    pub skip: Vec<ChunkId>,
    /// Reject chunks this crate does not interpret instead of keeping them opaque.
    pub strict: bool,
    pub roots: RootPolicy,
    pub limits: Limits,
}

impl DecodePolicy {
    /// Decodes every chunk and rejects anything unknown.
    pub fn full() -> Self {
        DecodePolicy {
            versions: VersionPolicy::AtMost(200),
            skip: Vec::new(),
            strict: true,
            roots: RootPolicy::Single,
            limits: Limits::default(),
        }
    }

    /// Drops scene graph and note chunks, keeps unknown chunks opaque.
    pub fn selective() -> Self {
        DecodePolicy {
            versions: VersionPolicy::OneOf(&[150, 200]),
            skip: vec![
                ChunkId::NOTE,
                ChunkId::NODE_TRANSFORM,
                ChunkId::NODE_GROUP,
                ChunkId::NODE_SHAPE,
            ],
            strict: false,
            roots: RootPolicy::UntilExhausted,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    fn skips(&self, id: ChunkId) -> bool {
        self.skip.contains(&id)
    }
}

impl Default for DecodePolicy {
    fn default() -> Self {
        DecodePolicy::full()
    }
}

/// Running total of bytes allocated for one parse.
#[derive(Debug, Clone)]
pub(crate) struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    pub(crate) fn new(limit: usize, used: usize) -> Self {
        Budget { limit, used }
    }

    pub(crate) fn claim(&mut self, bytes: usize) -> Result<()> {
        match self.used.checked_add(bytes) {
            Some(total) if total <= self.limit => {
                self.used = total;
                Ok(())
            }
            _ => Err(VoxError::AllocationLimitExceeded { requested: bytes, limit: self.limit }),
        }
    }
}

struct ChunkDecoder<'p> {
    policy: &'p DecodePolicy,
    budget: Budget,
}

impl<'p> ChunkDecoder<'p> {
    fn new(policy: &'p DecodePolicy) -> Self {
        ChunkDecoder { policy, budget: Budget::new(policy.limits.max_alloc_bytes, 0) }
    }

    /// Decodes the chunk at the cursor, `None` if the policy skips it.
    ///
    /// `parent` is the id and offset of the enclosing chunk when `cursor`
    /// spans only that chunk's children; running out of it is then reported
    /// against the parent as malformed rather than as truncated input.
    fn decode<'a>(
        &mut self,
        cursor: &mut Cursor<'a>,
        depth: usize,
        parent: Option<(ChunkId, usize)>,
    ) -> Result<Option<Chunk<'a>>> {
        if depth > self.policy.limits.max_depth {
            return Err(VoxError::DepthLimitExceeded { limit: self.policy.limits.max_depth });
        }
        let overrun = |error: VoxError| match (error, parent) {
            (VoxError::TruncatedInput { .. }, Some((id, offset))) => VoxError::MalformedChunk {
                id,
                offset,
                reason: "children overrun the declared children length",
            },
            (error, _) => error,
        };

        let start = cursor.position();
        let (id, content_len, children_len) = cursor
            .read(CHUNK_HEADER_LEN, tuple((ChunkId::parse, le_u32, le_u32)))
            .map_err(overrun)?;
        let (content_len, children_len) = (content_len as usize, children_len as usize);
        debug!(
            "Found chunk {:?} at {} / len {} / children {}",
            id, start, content_len, children_len
        );

        if self.policy.skips(id) {
            cursor.skip(content_len).map_err(overrun)?;
            cursor.skip(children_len).map_err(overrun)?;
            return Ok(None);
        }

        let content_start = cursor.position();
        let content = cursor.read_bytes(content_len).map_err(overrun)?;
        let kind = ChunkKind::parse(id, content, content_start, &mut self.budget)?;
        if kind == ChunkKind::Opaque && self.policy.strict {
            return Err(VoxError::UnknownChunk { id, offset: start });
        }

        let children_start = cursor.position();
        let children_bytes = cursor.read_bytes(children_len).map_err(overrun)?;
        let mut children_cursor = Cursor::with_base(children_bytes, children_start);
        let mut children = Vec::new();
        while !children_cursor.is_empty() {
            children.extend(self.decode(&mut children_cursor, depth + 1, Some((id, start)))?);
        }

        Ok(Some(Chunk { id, content, children_len: children_len as u32, kind, children }))
    }
}

/// A parsed contents of a MagicaVoxel .vox file
#[derive(Debug, Clone, PartialEq)]
pub struct VoxFile<'a> {
    pub version: u32,
    /// Root chunks in file order. A single `MAIN` under [`RootPolicy::Single`].
    pub chunks: Vec<Chunk<'a>>,
    /// Bytes allocated for decoded payloads so far, counted against [`Limits::max_alloc_bytes`].
    pub(crate) allocated: usize,
}

impl<'a> VoxFile<'a> {
    /// Parses with [`DecodePolicy::full`].
    pub fn parse_flat(bytes: &'a [u8]) -> Result<Self> {
        VoxFile::parse(bytes, &DecodePolicy::full())
    }

    pub fn parse(bytes: &'a [u8], policy: &DecodePolicy) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_id()?;
        if magic != MAGIC {
            return Err(VoxError::BadMagic { found: magic });
        }
        let version = cursor.read_u32()?;
        if !policy.versions.accepts(version) {
            return Err(VoxError::UnsupportedVersion { version });
        }

        let mut decoder = ChunkDecoder::new(policy);
        let chunks = match policy.roots {
            RootPolicy::Single => {
                let main = decoder
                    .decode(&mut cursor, 0, None)?
                    .filter(|chunk| chunk.id == ChunkId::MAIN)
                    .ok_or(VoxError::MissingChunk { id: ChunkId::MAIN })?;
                if !cursor.is_empty() {
                    warn!("{} trailing bytes after main chunk", cursor.remaining());
                }
                vec![main]
            }
            RootPolicy::UntilExhausted => {
                let mut chunks = Vec::new();
                while !cursor.is_empty() {
                    chunks.extend(decoder.decode(&mut cursor, 0, None)?);
                }
                chunks
            }
        };

        Ok(VoxFile { version, chunks, allocated: decoder.budget.used })
    }

    /// The first root `MAIN` chunk.
    pub fn main_chunk(&self) -> Result<&Chunk<'a>> {
        self.chunks
            .iter()
            .find(|chunk| chunk.id == ChunkId::MAIN)
            .ok_or(VoxError::MissingChunk { id: ChunkId::MAIN })
    }
}
