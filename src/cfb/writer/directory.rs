//! Directory stream generation.
//!
//! Siblings are ordered with the compound file comparator (shorter names
//! first, then case-insensitive) and linked around the midpoint, every node
//! black.

use super::super::consts::*;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    entry_type: u8,
    start_sector: u32,
    size: u64,
    sid_left: u32,
    sid_right: u32,
    sid_child: u32,
}

impl Node {
    fn new(name: &str, entry_type: u8, start_sector: u32, size: u64) -> Self {
        Self {
            name: name.to_string(),
            entry_type,
            start_sector,
            size,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        }
    }

    fn to_bytes(&self, out: &mut Vec<u8>) {
        let mut data = [0u8; DIRENTRY_SIZE];
        let units: Vec<u16> = self.name.encode_utf16().take(31).collect();
        for (i, unit) in units.iter().enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        let name_len = if units.is_empty() {
            0
        } else {
            ((units.len() + 1) * 2) as u16
        };
        data[64..66].copy_from_slice(&name_len.to_le_bytes());
        data[66] = self.entry_type;
        data[67] = COLOR_BLACK;
        data[68..72].copy_from_slice(&self.sid_left.to_le_bytes());
        data[72..76].copy_from_slice(&self.sid_right.to_le_bytes());
        data[76..80].copy_from_slice(&self.sid_child.to_le_bytes());
        data[116..120].copy_from_slice(&self.start_sector.to_le_bytes());
        data[120..128].copy_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&data);
    }
}

/// Name order used by compound file directories.
pub(super) fn compare_names(a: &str, b: &str) -> Ordering {
    let len_a = a.encode_utf16().count();
    let len_b = b.encode_utf16().count();
    len_a
        .cmp(&len_b)
        .then_with(|| a.to_uppercase().cmp(&b.to_uppercase()))
}

pub(super) struct DirectoryBuilder {
    nodes: Vec<Node>,
    storages: HashMap<Vec<String>, u32>,
    children: HashMap<u32, Vec<u32>>,
}

impl DirectoryBuilder {
    pub fn new(ministream_start: u32, ministream_size: u64) -> Self {
        let root = Node::new("Root Entry", STGTY_ROOT, ministream_start, ministream_size);
        Self {
            nodes: vec![root],
            storages: HashMap::from([(Vec::new(), 0)]),
            children: HashMap::new(),
        }
    }

    /// Ensure every storage along `path` exists; returns the SID of the last one.
    pub fn add_storage_path(&mut self, path: &[String]) -> u32 {
        let mut parent = 0u32;
        for depth in 1..=path.len() {
            let key = &path[..depth];
            if let Some(&sid) = self.storages.get(key) {
                parent = sid;
                continue;
            }
            let sid = self.nodes.len() as u32;
            self.nodes
                .push(Node::new(&path[depth - 1], STGTY_STORAGE, 0, 0));
            self.storages.insert(key.to_vec(), sid);
            self.children.entry(parent).or_default().push(sid);
            parent = sid;
        }
        parent
    }

    pub fn add_stream_path(&mut self, path: &[String], start_sector: u32, size: u64) -> u32 {
        let (name, parents) = match path.split_last() {
            Some(split) => split,
            None => return NOSTREAM,
        };
        let parent = self.add_storage_path(parents);
        let sid = self.nodes.len() as u32;
        self.nodes
            .push(Node::new(name, STGTY_STREAM, start_sector, size));
        self.children.entry(parent).or_default().push(sid);
        sid
    }

    pub fn generate_directory_stream(mut self) -> Vec<u8> {
        let parents: Vec<u32> = self.children.keys().copied().collect();
        for parent in parents {
            if let Some(children) = self.children.get(&parent).cloned() {
                self.link_children(parent, children);
            }
        }

        let mut data = Vec::with_capacity(self.nodes.len() * DIRENTRY_SIZE);
        for node in &self.nodes {
            node.to_bytes(&mut data);
        }
        // pad the last sector with empty entries
        let per_sector = SECTOR_SIZE / DIRENTRY_SIZE;
        let padding = (per_sector - self.nodes.len() % per_sector) % per_sector;
        for _ in 0..padding {
            Node::new("", STGTY_EMPTY, 0, 0).to_bytes(&mut data);
        }
        data
    }

    /// Midpoint becomes the child pointer, earlier siblings chain left,
    /// later ones chain right.
    fn link_children(&mut self, parent: u32, mut sids: Vec<u32>) {
        sids.sort_by(|&a, &b| compare_names(&self.nodes[a as usize].name, &self.nodes[b as usize].name));
        let mid = sids.len() / 2;
        self.nodes[parent as usize].sid_child = sids[mid];
        for i in 0..mid {
            let node = &mut self.nodes[sids[i] as usize];
            node.sid_left = if i > 0 { sids[i - 1] } else { NOSTREAM };
            node.sid_right = NOSTREAM;
        }
        for i in mid + 1..sids.len() {
            let node = &mut self.nodes[sids[i] as usize];
            node.sid_left = NOSTREAM;
            node.sid_right = sids.get(i + 1).copied().unwrap_or(NOSTREAM);
        }
        let mid_node = &mut self.nodes[sids[mid] as usize];
        mid_node.sid_left = if mid > 0 { sids[mid - 1] } else { NOSTREAM };
        mid_node.sid_right = sids.get(mid + 1).copied().unwrap_or(NOSTREAM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn comparator_orders_by_length_then_name() {
        assert_eq!(compare_names("Data", "1Table"), Ordering::Less);
        assert_eq!(compare_names("abc", "ABD"), Ordering::Less);
        assert_eq!(compare_names("EncryptionInfo", "encryptioninfo"), Ordering::Equal);
    }

    #[test]
    fn nested_storages_are_created_once() {
        let mut dir = DirectoryBuilder::new(ENDOFCHAIN, 0);
        let a = dir.add_stream_path(&path(&["\u{6}DataSpaces", "Version"]), 0, 10);
        let b = dir.add_stream_path(&path(&["\u{6}DataSpaces", "DataSpaceMap"]), 1, 10);
        assert_eq!((a, b), (2, 3));
        assert_eq!(dir.nodes.len(), 4);
        let data = dir.generate_directory_stream();
        assert_eq!(data.len(), SECTOR_SIZE);
    }

    #[test]
    fn midpoint_is_child() {
        let mut dir = DirectoryBuilder::new(ENDOFCHAIN, 0);
        for name in ["A", "BB", "CCC"] {
            dir.add_stream_path(&path(&[name]), 0, 1);
        }
        dir.link_children(0, vec![1, 2, 3]);
        assert_eq!(dir.nodes[0].sid_child, 2);
        assert_eq!(dir.nodes[2].sid_left, 1);
        assert_eq!(dir.nodes[2].sid_right, 3);
    }
}
