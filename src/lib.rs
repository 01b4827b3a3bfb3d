//! A single-table record store kept in fixed-size pages of one file.
//!
//! The table lives entirely in its root leaf node (page 0), so capacity is
//! [`constants::LEAF_NODE_MAX_CELLS`] rows. Inserts append in arrival order and
//! `select` walks the cells with a [`table::Cursor`].

pub mod btree;
pub mod constants;
pub mod pager;
pub mod row;
pub mod table;
pub mod virtual_machine;

pub use row::Row;
pub use table::{Table, TableError};
