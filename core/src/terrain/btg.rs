//! `BtgDecoder`: decodes FlightGear's binary terrain geometry format into
//! a triangle mesh plus bounding sphere, used by the terrain sampler.

use std::io::{Read, Seek, SeekFrom};

use tracing::warn;

use crate::error::{Error, Result};

const BTG_MAGIC: u16 = 0x5347;
const MAX_PROP_OR_ELEM_SIZE: u64 = 100_000_000;
const MAX_OBJECT_COUNT: u16 = 10_000;

const OBJ_BOUNDING_SPHERE: u8 = 0;
const OBJ_VERTEX_LIST: u8 = 1;
const OBJ_TRIANGLES: u8 = 10;
const OBJ_TRIANGLE_STRIP: u8 = 11;
const OBJ_TRIANGLE_FAN: u8 = 12;

/// A single decoded terrain mesh: vertices relative to the bounding
/// sphere center, and the triangle index list into that vertex array.
#[derive(Debug, Clone, Default)]
pub struct BtgMesh {
    pub center: [f64; 3],
    pub radius: f32,
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

fn tuple_u16_count(flags: u8, obj_type: u8) -> usize {
    if flags == 0 {
        4
    } else if obj_type == 9 {
        2
    } else {
        flags.count_ones().max(1) as usize
    }
}

fn faces_from_flat_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
    indices
        .chunks_exact(3)
        .map(|t| [t[0], t[2], t[1]]) // winding inverted per the BTG producer convention
        .collect()
}

fn faces_from_strip(indices: &[u32]) -> Vec<[u32; 3]> {
    if indices.len() < 3 {
        return Vec::new();
    }
    indices
        .windows(3)
        .enumerate()
        .map(|(i, w)| {
            if i % 2 == 0 {
                [w[0], w[1], w[2]]
            } else {
                [w[1], w[0], w[2]]
            }
        })
        .collect()
}

fn faces_from_fan(indices: &[u32]) -> Vec<[u32; 3]> {
    if indices.len() < 3 {
        return Vec::new();
    }
    let center = indices[0];
    (1..indices.len() - 1)
        .map(|i| [center, indices[i], indices[i + 1]])
        .collect()
}

/// Decodes a BTG byte stream into zero or more meshes (one per
/// contiguous run of vertex-list + triangle objects is not assumed;
/// instead a single mesh accumulates all vertex and triangle objects in
/// the file, matching how a tile's terrain is typically packed).
pub fn decode<R: Read + Seek>(mut reader: R) -> Result<BtgMesh> {
    let mut header = [0u8; 2 + 2 + 4 + 2];
    reader.read_exact(&mut header)?;
    let _version = u16::from_le_bytes(header[0..2].try_into().unwrap());
    let magic = u16::from_le_bytes(header[2..4].try_into().unwrap());
    if magic != BTG_MAGIC {
        return Err(Error::MalformedHeader(format!(
            "BTG magic mismatch: {magic:#06x}"
        )));
    }
    let object_count = u16::from_le_bytes(header[8..10].try_into().unwrap());
    if object_count > MAX_OBJECT_COUNT {
        return Err(Error::CorruptElement(format!(
            "implausible BTG object count {object_count}"
        )));
    }

    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(header.len() as u64))?;

    let mut mesh = BtgMesh::default();

    for _ in 0..object_count {
        let mut obj_header = [0u8; 5];
        if reader.read_exact(&mut obj_header).is_err() {
            warn!("BTG truncated before object header; stopping");
            break;
        }
        let obj_type = obj_header[0];
        let prop_count = u16::from_le_bytes(obj_header[1..3].try_into().unwrap());
        let elem_count = u16::from_le_bytes(obj_header[3..5].try_into().unwrap());

        let mut index_flags: u8 = 0;

        for _ in 0..prop_count {
            let prop_start = reader.stream_position()?;
            let mut prop_head = [0u8; 5];
            if reader.read_exact(&mut prop_head).is_err() {
                warn!("BTG truncated mid-property; aborting object");
                return Ok(mesh);
            }
            let prop_type = prop_head[0];
            let prop_size = u32::from_le_bytes(prop_head[1..5].try_into().unwrap());
            if u64::from(prop_size) > stream_len || u64::from(prop_size) > MAX_PROP_OR_ELEM_SIZE {
                warn!(prop_size, prop_start, "implausible BTG property size; aborting decode, keeping mesh decoded so far");
                return Ok(mesh);
            }
            let mut data = vec![0u8; prop_size as usize];
            reader.read_exact(&mut data)?;
            if prop_type == 1 && !data.is_empty() {
                index_flags = data[0];
            }
            reader.seek(SeekFrom::Start(prop_start + 5 + u64::from(prop_size)))?;
        }

        for _ in 0..elem_count {
            let elem_start = reader.stream_position()?;
            let mut elem_size_bytes = [0u8; 4];
            if reader.read_exact(&mut elem_size_bytes).is_err() {
                warn!("BTG truncated mid-element; aborting object");
                return Ok(mesh);
            }
            let elem_size = u32::from_le_bytes(elem_size_bytes);
            if u64::from(elem_size) > stream_len || u64::from(elem_size) > MAX_PROP_OR_ELEM_SIZE {
                warn!(elem_size, elem_start, "implausible BTG element size; aborting decode, keeping mesh decoded so far");
                return Ok(mesh);
            }
            if elem_size == 0 {
                reader.seek(SeekFrom::Start(elem_start + 4))?;
                continue;
            }
            let mut data = vec![0u8; elem_size as usize];
            reader.read_exact(&mut data)?;

            decode_element(obj_type, index_flags, &data, &mut mesh);

            reader.seek(SeekFrom::Start(elem_start + 4 + u64::from(elem_size)))?;
        }

    }

    Ok(mesh)
}

fn decode_element(obj_type: u8, index_flags: u8, data: &[u8], mesh: &mut BtgMesh) {
    match obj_type {
        OBJ_BOUNDING_SPHERE => {
            if data.len() >= 28 {
                let x = f64::from_le_bytes(data[0..8].try_into().unwrap());
                let y = f64::from_le_bytes(data[8..16].try_into().unwrap());
                let z = f64::from_le_bytes(data[16..24].try_into().unwrap());
                let radius = f32::from_le_bytes(data[24..28].try_into().unwrap());
                mesh.center = [x, y, z];
                mesh.radius = radius;
            }
        }
        OBJ_VERTEX_LIST => {
            for chunk in data.chunks_exact(12) {
                let x = f32::from_le_bytes(chunk[0..4].try_into().unwrap());
                let y = f32::from_le_bytes(chunk[4..8].try_into().unwrap());
                let z = f32::from_le_bytes(chunk[8..12].try_into().unwrap());
                mesh.vertices.push([x, y, z]);
            }
        }
        OBJ_TRIANGLES | OBJ_TRIANGLE_STRIP | OBJ_TRIANGLE_FAN => {
            let tuple_len = tuple_u16_count(index_flags, obj_type);
            let u16s: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
                .collect();
            let vertex_indices: Vec<u32> = u16s
                .chunks_exact(tuple_len.max(1))
                .map(|t| u32::from(t[0]))
                .collect();

            let faces = match obj_type {
                OBJ_TRIANGLES => faces_from_flat_triangles(&vertex_indices),
                OBJ_TRIANGLE_STRIP => faces_from_strip(&vertex_indices),
                OBJ_TRIANGLE_FAN => faces_from_fan(&vertex_indices),
                _ => unreachable!(),
            };
            mesh.triangles.extend(faces);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(object_count: u16) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&BTG_MAGIC.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(&object_count.to_le_bytes());
        h
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header(0);
        bytes[2..4].copy_from_slice(&0xDEADu16.to_le_bytes());
        assert!(decode(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn rejects_implausible_object_count() {
        let bytes = header(20_000);
        assert!(decode(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn decodes_vertex_list_and_flat_triangle() {
        let mut bytes = header(2);

        // Vertex list object: 3 vertices.
        bytes.push(OBJ_VERTEX_LIST);
        bytes.extend_from_slice(&0u16.to_le_bytes()); // prop_count
        bytes.extend_from_slice(&1u16.to_le_bytes()); // elem_count
        let mut verts = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            verts.extend_from_slice(&v[0].to_le_bytes());
            verts.extend_from_slice(&v[1].to_le_bytes());
            verts.extend_from_slice(&v[2].to_le_bytes());
        }
        bytes.extend_from_slice(&(verts.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&verts);

        // Triangle object: flags == 0 -> tuple length 4 (vertex+texcoord).
        bytes.push(OBJ_TRIANGLES);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        let tri_indices: Vec<u16> = vec![0, 0, 1, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        let mut tri_bytes = Vec::new();
        for v in &tri_indices {
            tri_bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&(tri_bytes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&tri_bytes);

        let mesh = decode(Cursor::new(bytes)).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles.len(), 1);
    }
}
