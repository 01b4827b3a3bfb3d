use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::btree::{LeafNode, LeafNodeError, NodeType};
use crate::constants::*;
use crate::pager::{Pager, PagerError};
use crate::row::Row;

pub struct Table {
    pub root_page_num: u32,
    pager: Pager,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error(transparent)]
    Node(#[from] LeafNodeError),
    /// The root leaf holds `LEAF_NODE_MAX_CELLS` rows and the tree cannot grow.
    #[error("table full")]
    Full,
    #[error("corrupt database file: {0}")]
    Corrupt(String),
}

impl Table {
    pub fn open<P>(filename: P) -> Result<Self, TableError>
    where
        P: AsRef<Path>,
    {
        let mut pager = Pager::open(filename)?;
        let root_page_num = 0;

        if pager.num_pages() == 0 {
            // New database file. Initialize page 0 as leaf node.
            let root = pager.get_page(root_page_num)?;
            let mut node = LeafNode::new(&mut root.buffer)?;
            node.initialize();
            node.set_root(true);
            node.set_parent_pointer(0);
            debug!("initialized empty root leaf");
        } else if let Err(e) = check_root(&mut pager, root_page_num) {
            // a rejected file must be left exactly as it was found
            pager.discard();
            return Err(e);
        }

        Ok(Table {
            root_page_num,
            pager,
        })
    }

    /// Flushes every cached page and releases the file.
    pub fn close(self) -> Result<(), TableError> {
        self.pager.close()?;
        Ok(())
    }

    pub fn num_rows(&mut self) -> Result<u32, TableError> {
        let page = self.pager.get_page(self.root_page_num)?;
        Ok(LeafNode::new(&page.buffer)?.num_cells())
    }

    pub fn start(&mut self) -> Result<Cursor, TableError> {
        let page_num = self.root_page_num;
        let num_cells = self.num_rows()?;
        Ok(Cursor {
            table: self,
            page_num,
            cell_num: 0,
            end_of_table: num_cells == 0,
        })
    }

    pub fn end(&mut self) -> Result<Cursor, TableError> {
        let page_num = self.root_page_num;
        let num_cells = self.num_rows()?;
        Ok(Cursor {
            table: self,
            page_num,
            cell_num: num_cells,
            end_of_table: true,
        })
    }

    /// Appends `row` keyed by its id. Rows are kept in insertion order, not key order.
    pub fn insert(&mut self, row: &Row) -> Result<(), TableError> {
        let root = self.pager.get_page(self.root_page_num)?;
        if LeafNode::new(&root.buffer)?.is_full() {
            info!(id = row.id, "rejecting insert, table full");
            return Err(TableError::Full);
        }
        let mut cursor = self.end()?;
        cursor.insert(row.id, row)
    }

    pub fn select(&mut self) -> Result<Vec<Row>, TableError> {
        let mut rows = Vec::new();
        let mut cursor = self.start()?;
        while !cursor.end_of_table {
            rows.push(cursor.row()?);
            cursor.advance()?;
        }
        Ok(rows)
    }
}

fn check_root(pager: &mut Pager, root_page_num: u32) -> Result<(), TableError> {
    let root = pager.get_page(root_page_num)?;
    let node = LeafNode::new(&root.buffer)?;
    match node.node_type() {
        Ok(NodeType::Leaf) => {}
        Ok(NodeType::Internal) => {
            warn!("root page is not a leaf node");
            return Err(TableError::Corrupt("root page is not a leaf node".into()));
        }
        Err(e) => {
            warn!(error = %e, "root page has no valid node type");
            return Err(TableError::Corrupt(format!("root page: {}", e)));
        }
    }
    if node.num_cells() as usize > LEAF_NODE_MAX_CELLS {
        warn!(num_cells = node.num_cells(), "root leaf cell count out of range");
        return Err(TableError::Corrupt(format!(
            "root leaf claims {} cells, at most {} fit",
            node.num_cells(),
            LEAF_NODE_MAX_CELLS
        )));
    }
    Ok(())
}

/// A position in the root leaf. Iteration is single pass; build a new cursor to start over.
pub struct Cursor<'table> {
    table: &'table mut Table,
    page_num: u32,
    cell_num: u32,
    pub end_of_table: bool,
}

impl Cursor<'_> {
    fn node(&mut self) -> Result<LeafNode<&mut [u8; PAGE_SIZE]>, TableError> {
        let page = self.table.pager.get_page(self.page_num)?;
        Ok(LeafNode::new(&mut page.buffer)?)
    }

    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    pub fn key(&mut self) -> Result<u32, TableError> {
        let cell_num = self.cell_num as usize;
        Ok(self.node()?.key(cell_num)?)
    }

    /// The serialized row of the current cell. Fails once the cursor is past the last cell.
    pub fn value(&mut self) -> Result<&mut [u8; ROW_SIZE], TableError> {
        let cell_num = self.cell_num as usize;
        Ok(self.node()?.into_value_mut(cell_num)?)
    }

    pub fn row(&mut self) -> Result<Row, TableError> {
        Ok(Row::deserialize(self.value()?))
    }

    pub fn advance(&mut self) -> Result<(), TableError> {
        let num_cells = self.node()?.num_cells();
        self.cell_num += 1;
        if self.cell_num >= num_cells {
            self.end_of_table = true;
        }
        Ok(())
    }

    pub fn insert(&mut self, key: u32, row: &Row) -> Result<(), TableError> {
        let cell_num = self.cell_num as usize;
        self.node()?.insert(cell_num, key, row)?;
        debug!(key, cell_num, "inserted cell");
        Ok(())
    }
}
