use nom::{number::complete::le_u32, sequence::tuple};
use pretty_assertions::assert_eq;
use vox_reader::{cursor::Cursor, syntax::ChunkId, VoxError};

#[test]
fn reads_fields_in_order() -> anyhow::Result<()> {
    let mut bytes = b"SIZE".to_vec();
    bytes.extend(&7u32.to_le_bytes());
    bytes.extend(&(-2i32).to_le_bytes());
    bytes.extend(&1.5f32.to_le_bytes());
    bytes.extend(&[9, 8, 7]);

    let mut cursor = Cursor::new(&bytes);
    assert_eq!(cursor.read_id()?, ChunkId::SIZE);
    assert_eq!(cursor.read_u32()?, 7);
    assert_eq!(cursor.read_i32()?, -2);
    assert_eq!(cursor.read_f32()?, 1.5);
    assert_eq!(cursor.offset(), 16);
    assert_eq!(cursor.read_bytes(3)?, &[9, 8, 7]);
    assert!(cursor.is_empty());
    Ok(())
}

#[test]
fn reads_a_fixed_layout() -> anyhow::Result<()> {
    let bytes: Vec<u8> = [1u32, 2, 3].iter().flat_map(|n| n.to_le_bytes().to_vec()).collect();
    let mut cursor = Cursor::new(&bytes);
    assert_eq!(cursor.read(12, tuple((le_u32, le_u32, le_u32)))?, (1, 2, 3));
    assert_eq!(cursor.remaining(), 0);
    Ok(())
}

#[test]
fn truncated_read_keeps_offset() {
    let bytes = [1, 0, 0, 0, 2, 0];
    let mut cursor = Cursor::with_base(&bytes, 100);
    assert_eq!(cursor.read_u32(), Ok(1));
    assert_eq!(
        cursor.read_u32(),
        Err(VoxError::TruncatedInput { offset: 104, needed: 4, remaining: 2 })
    );
    assert_eq!(cursor.offset(), 4);
    assert_eq!(cursor.position(), 104);
    assert!(cursor.skip(3).is_err());
    assert!(cursor.skip(2).is_ok());
}
