//! # Rows and Fields
//!
//! A `Row` is a fully materialised row slot: its position, its
//! deletion flag, and one decoded `Field` per exposed column. Fields
//! pair the column descriptor with a domain value, so a row carries
//! everything `write_row` needs to encode it back.
//!
//! Rows are plain data detached from the table handle; mutating a
//! field changes nothing on disk until the row is written back.

use crate::types::{Column, Value};
use eyre::{bail, Result};

/// One decoded column slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    column: Column,
    value: Value,
}

impl Field {
    pub fn new(column: Column, value: Value) -> Self {
        Self { column, value }
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

/// A materialised row slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    position: u32,
    deleted: bool,
    fields: Vec<Field>,
}

impl Row {
    pub(crate) fn new(position: u32, deleted: bool, fields: Vec<Field>) -> Self {
        Self {
            position,
            deleted,
            fields,
        }
    }

    /// The row slot index this row was read from, or will be written
    /// to.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Marks the row slot deleted or live; takes effect on the next
    /// write.
    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks a field up by column name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column.is_named(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.column.is_named(name))
    }

    /// Replaces the value of the named field.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        match self.field_mut(name) {
            Some(field) => {
                field.set_value(value);
                Ok(())
            }
            None => bail!("row has no column named {name:?}"),
        }
    }
}
