use std::convert::TryFrom;

use thiserror::Error;
use tracing::debug;

use crate::row::{Row, RowError};
use crate::table::{Table, TableError};

#[derive(Debug, PartialEq, Eq)]
pub enum Statement {
    Insert { row: Row },
    Select,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("Syntax error. Could not parse statement.")]
    Syntax,
    #[error("String is too long.")]
    TooLong,
    #[error("ID must be positive.")]
    NegativeId,
    #[error("Unrecognized keyword at start of '{0}'.")]
    Unrecognized(String),
}

impl From<RowError> for StatementError {
    fn from(_: RowError) -> Self {
        StatementError::TooLong
    }
}

pub struct VirtualMachine<'a> {
    pub table: &'a mut Table,
}

#[derive(Debug, Error)]
pub enum VMErr {
    #[error("Error: Table full.")]
    TableFull,
    #[error(transparent)]
    Table(TableError),
}

impl From<TableError> for VMErr {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Full => VMErr::TableFull,
            other => VMErr::Table(other),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum VMResult {
    Rows(Vec<Row>),
    Success,
}

pub fn prepare_statement(original_input: &str) -> Result<Statement, StatementError> {
    let mut parts = original_input.split_whitespace();
    match parts.next() {
        Some("insert") => {
            let id = parts.next();
            let username = parts.next();
            let email = parts.next();
            match (id, username, email) {
                (Some(id), Some(username), Some(email)) => {
                    let id: i64 = id.parse().map_err(|_| StatementError::Syntax)?;
                    if id < 0 {
                        return Err(StatementError::NegativeId);
                    }
                    let id = u32::try_from(id).map_err(|_| StatementError::Syntax)?;
                    Ok(Statement::Insert {
                        row: Row::new(id, username, email)?,
                    })
                }
                _ => Err(StatementError::Syntax),
            }
        }
        Some("select") => Ok(Statement::Select),
        _ => Err(StatementError::Unrecognized(original_input.to_owned())),
    }
}

impl VirtualMachine<'_> {
    pub fn execute_statement(&mut self, statement: Statement) -> Result<VMResult, VMErr> {
        match statement {
            Statement::Insert { row } => {
                debug!(id = row.id, "executing insert");
                self.table.insert(&row)?;
                Ok(VMResult::Success)
            }
            Statement::Select => {
                debug!("executing select");
                Ok(VMResult::Rows(self.table.select()?))
            }
        }
    }
}
