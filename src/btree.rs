use std::convert::{TryFrom, TryInto};

use thiserror::Error;

use crate::constants::*;
use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

impl TryFrom<u8> for NodeType {
    type Error = LeafNodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            other => Err(LeafNodeError::UnknownNodeType(other)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeafNodeError {
    /// Splitting a full leaf into a multi-level tree is not supported.
    #[error("leaf node is full ({max} cells), splitting is not implemented")]
    Full { max: usize },
    #[error("cell {cell_num} is outside the {num_cells} cells of the node")]
    CellOutOfRange { cell_num: usize, num_cells: usize },
    #[error("unknown node type tag {0}")]
    UnknownNodeType(u8),
    #[error("buffer is smaller than a page")]
    BadPageSize,
}

/// A page buffer read as a leaf node: a fixed header followed by
/// `num_cells` contiguous `(key, row)` cells.
pub struct LeafNode<B> {
    buffer: B,
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    /// Fails with `BadPageSize` when the buffer cannot hold a whole page.
    pub fn new(buffer: B) -> Result<Self, LeafNodeError> {
        if buffer.as_ref().len() < PAGE_SIZE {
            return Err(LeafNodeError::BadPageSize);
        }
        Ok(LeafNode { buffer })
    }
}

fn cell_offset(cell_num: usize) -> usize {
    LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    // new() guarantees at least PAGE_SIZE bytes
    fn bytes(&self) -> &[u8] {
        &self.buffer.as_ref()[..PAGE_SIZE]
    }

    pub fn node_type(&self) -> Result<NodeType, LeafNodeError> {
        NodeType::try_from(self.bytes()[NODE_TYPE_OFFSET])
    }

    pub fn is_root(&self) -> bool {
        self.bytes()[IS_ROOT_OFFSET] != 0
    }

    pub fn parent_pointer(&self) -> u32 {
        read_u32(self.bytes(), PARENT_POINTER_OFFSET)
    }

    pub fn num_cells(&self) -> u32 {
        read_u32(self.bytes(), LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn is_full(&self) -> bool {
        self.num_cells() as usize >= LEAF_NODE_MAX_CELLS
    }

    fn check_cell(&self, cell_num: usize) -> Result<(), LeafNodeError> {
        let num_cells = self.num_cells() as usize;
        if cell_num >= num_cells || cell_num >= LEAF_NODE_MAX_CELLS {
            return Err(LeafNodeError::CellOutOfRange {
                cell_num,
                num_cells,
            });
        }
        Ok(())
    }

    pub fn key(&self, cell_num: usize) -> Result<u32, LeafNodeError> {
        self.check_cell(cell_num)?;
        Ok(read_u32(
            self.bytes(),
            cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET,
        ))
    }

    pub fn value(&self, cell_num: usize) -> Result<&[u8; LEAF_NODE_VALUE_SIZE], LeafNodeError> {
        self.check_cell(cell_num)?;
        let start = cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        self.bytes()[start..start + LEAF_NODE_VALUE_SIZE]
            .try_into()
            .map_err(|_| LeafNodeError::BadPageSize)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafNode<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[..PAGE_SIZE]
    }

    /// Formats the page as an empty leaf. Root flag and parent pointer are left for the caller.
    pub fn initialize(&mut self) {
        self.bytes_mut()[NODE_TYPE_OFFSET] = NodeType::Leaf as u8;
        self.set_num_cells(0);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.bytes_mut()[IS_ROOT_OFFSET] = is_root as u8;
    }

    pub fn set_parent_pointer(&mut self, page_num: u32) {
        write_u32(self.bytes_mut(), PARENT_POINTER_OFFSET, page_num);
    }

    fn set_num_cells(&mut self, num_cells: u32) {
        write_u32(self.bytes_mut(), LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
    }

    pub fn value_mut(
        &mut self,
        cell_num: usize,
    ) -> Result<&mut [u8; LEAF_NODE_VALUE_SIZE], LeafNodeError> {
        self.check_cell(cell_num)?;
        let start = cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        (&mut self.bytes_mut()[start..start + LEAF_NODE_VALUE_SIZE])
            .try_into()
            .map_err(|_| LeafNodeError::BadPageSize)
    }

    /// Inserts a cell at `cell_num`, moving the cells at and after it one slot right.
    pub fn insert(&mut self, cell_num: usize, key: u32, row: &Row) -> Result<(), LeafNodeError> {
        let num_cells = self.num_cells() as usize;
        if num_cells >= LEAF_NODE_MAX_CELLS {
            return Err(LeafNodeError::Full {
                max: LEAF_NODE_MAX_CELLS,
            });
        }
        if cell_num > num_cells {
            return Err(LeafNodeError::CellOutOfRange {
                cell_num,
                num_cells,
            });
        }

        if cell_num < num_cells {
            // inserting into the middle of existing cells, make room
            let src = cell_offset(cell_num)..cell_offset(num_cells);
            self.bytes_mut()
                .copy_within(src, cell_offset(cell_num + 1));
        }

        self.set_num_cells(num_cells as u32 + 1);
        write_u32(
            self.bytes_mut(),
            cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET,
            key,
        );
        row.serialize(self.value_mut(cell_num)?);
        Ok(())
    }
}

impl<'a> LeafNode<&'a mut [u8; PAGE_SIZE]> {
    /// Like `value_mut`, but the slot borrows the page rather than this view.
    pub fn into_value_mut(
        self,
        cell_num: usize,
    ) -> Result<&'a mut [u8; LEAF_NODE_VALUE_SIZE], LeafNodeError> {
        self.check_cell(cell_num)?;
        let start = cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        let buffer: &'a mut [u8; PAGE_SIZE] = self.buffer;
        (&mut buffer[start..start + LEAF_NODE_VALUE_SIZE])
            .try_into()
            .map_err(|_| LeafNodeError::BadPageSize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_leaf() -> LeafNode<Vec<u8>> {
        let mut node = LeafNode::new(vec![0u8; PAGE_SIZE]).unwrap();
        node.initialize();
        node
    }

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("person{}@example.com", id)).unwrap()
    }

    #[test]
    fn header_fields_sit_at_fixed_offsets() {
        let mut buffer = [0xffu8; PAGE_SIZE];
        {
            let mut node = LeafNode::new(&mut buffer).unwrap();
            node.initialize();
            node.set_root(true);
            node.set_parent_pointer(0x0a0b_0c0d);
            assert_eq!(node.node_type(), Ok(NodeType::Leaf));
            assert!(node.is_root());
            assert_eq!(node.parent_pointer(), 0x0a0b_0c0d);
        }
        assert_eq!(buffer[0], 1);
        assert_eq!(buffer[1], 1);
        assert_eq!(&buffer[2..6], &[0x0d, 0x0c, 0x0b, 0x0a]);
        assert_eq!(&buffer[6..10], &[0, 0, 0, 0]);
    }

    #[test]
    fn short_buffer_is_not_a_page() {
        assert!(matches!(
            LeafNode::new(vec![0u8; PAGE_SIZE - 1]),
            Err(LeafNodeError::BadPageSize)
        ));
        assert!(LeafNode::new(&[0u8; 10][..]).is_err());
    }

    #[test]
    fn unknown_node_type_is_reported() {
        let mut buffer = [0u8; PAGE_SIZE];
        buffer[NODE_TYPE_OFFSET] = 7;
        let node = LeafNode::new(&buffer).unwrap();
        assert_eq!(node.node_type(), Err(LeafNodeError::UnknownNodeType(7)));
    }

    #[test]
    fn appended_cells_keep_insertion_order() {
        let mut node = empty_leaf();
        for (i, id) in [5u32, 1, 3].iter().enumerate() {
            node.insert(i, *id, &row(*id)).unwrap();
        }

        assert_eq!(node.num_cells(), 3);
        let keys: Vec<u32> = (0..3).map(|i| node.key(i).unwrap()).collect();
        assert_eq!(keys, vec![5, 1, 3]);
        assert_eq!(Row::deserialize(node.value(2).unwrap()), row(3));
    }

    #[test]
    fn inserting_in_the_middle_shifts_later_cells() {
        let mut node = empty_leaf();
        node.insert(0, 1, &row(1)).unwrap();
        node.insert(1, 3, &row(3)).unwrap();
        node.insert(1, 2, &row(2)).unwrap();

        let keys: Vec<u32> = (0..3).map(|i| node.key(i).unwrap()).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        for i in 0..3 {
            assert_eq!(Row::deserialize(node.value(i).unwrap()), row(i as u32 + 1));
        }
    }

    #[test]
    fn full_leaf_rejects_insert_without_touching_cells() {
        let mut node = empty_leaf();
        for i in 0..LEAF_NODE_MAX_CELLS {
            node.insert(i, i as u32, &row(i as u32)).unwrap();
        }
        assert!(node.is_full());

        assert_eq!(
            node.insert(LEAF_NODE_MAX_CELLS, 99, &row(99)),
            Err(LeafNodeError::Full {
                max: LEAF_NODE_MAX_CELLS
            })
        );
        assert_eq!(node.num_cells() as usize, LEAF_NODE_MAX_CELLS);
        for i in 0..LEAF_NODE_MAX_CELLS {
            assert_eq!(node.key(i).unwrap(), i as u32);
        }
    }

    #[test]
    fn reading_past_the_last_cell_fails() {
        let mut node = empty_leaf();
        node.insert(0, 1, &row(1)).unwrap();
        assert_eq!(
            node.key(1),
            Err(LeafNodeError::CellOutOfRange {
                cell_num: 1,
                num_cells: 1
            })
        );
        assert!(node.value(1).is_err());
        assert!(node.insert(5, 5, &row(5)).is_err());
    }
}
