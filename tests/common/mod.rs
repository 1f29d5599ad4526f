#![allow(dead_code)]

/// Builds `.vox` fixtures in memory.
pub struct ChunkBuilder {
    id: [u8; 4],
    content: Vec<u8>,
    children: Vec<ChunkBuilder>,
}

impl ChunkBuilder {
    pub fn new(id: &[u8; 4]) -> Self {
        ChunkBuilder { id: *id, content: Vec::new(), children: Vec::new() }
    }

    pub fn content(mut self, content: &[u8]) -> Self {
        self.content = content.to_vec();
        self
    }

    pub fn child(mut self, child: ChunkBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let children: Vec<u8> = self.children.iter().flat_map(ChunkBuilder::bytes).collect();
        let mut bytes = Vec::new();
        bytes.extend(&self.id);
        bytes.extend(&(self.content.len() as u32).to_le_bytes());
        bytes.extend(&(children.len() as u32).to_le_bytes());
        bytes.extend(&self.content);
        bytes.extend(children);
        bytes
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn main(children: Vec<ChunkBuilder>) -> ChunkBuilder {
    children.into_iter().fold(ChunkBuilder::new(b"MAIN"), ChunkBuilder::child)
}

pub fn pack(models: u32) -> ChunkBuilder {
    ChunkBuilder::new(b"PACK").content(&models.to_le_bytes())
}

pub fn size(x: u32, y: u32, z: u32) -> ChunkBuilder {
    let content: Vec<u8> = [x, y, z].iter().flat_map(|dim| dim.to_le_bytes().to_vec()).collect();
    ChunkBuilder::new(b"SIZE").content(&content)
}

pub fn xyzi(voxels: &[[u8; 4]]) -> ChunkBuilder {
    let mut content = (voxels.len() as u32).to_le_bytes().to_vec();
    for voxel in voxels {
        content.extend(voxel);
    }
    ChunkBuilder::new(b"XYZI").content(&content)
}

/// A full 256 color palette where entry `i` is `color(i)`.
pub fn rgba(color: impl Fn(usize) -> [u8; 4]) -> ChunkBuilder {
    let content: Vec<u8> = (0..256).flat_map(|i| color(i).to_vec()).collect();
    ChunkBuilder::new(b"RGBA").content(&content)
}

pub fn matt(id: i32, kind: i32, weight: f32, flags: u32, values: &[f32]) -> ChunkBuilder {
    let mut content = Vec::new();
    content.extend(&id.to_le_bytes());
    content.extend(&kind.to_le_bytes());
    content.extend(&weight.to_le_bytes());
    content.extend(&flags.to_le_bytes());
    for value in values {
        content.extend(&value.to_le_bytes());
    }
    ChunkBuilder::new(b"MATT").content(&content)
}

/// A scene graph chunk with some opaque content, as the selective decoder skips.
pub fn node(id: &[u8; 4]) -> ChunkBuilder {
    ChunkBuilder::new(id).content(&[1, 0, 0, 0, 0, 0, 0, 0])
}

pub fn vox_file(version: u32, roots: &[ChunkBuilder]) -> Vec<u8> {
    let mut bytes = b"VOX ".to_vec();
    bytes.extend(&version.to_le_bytes());
    for root in roots {
        bytes.extend(root.bytes());
    }
    bytes
}
