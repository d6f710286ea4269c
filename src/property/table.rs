//! Named column collections for vertex and edge properties.

use std::collections::HashMap;

use crate::property::column::Column;
use crate::property::types::DataType;

#[derive(Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    header: HashMap<String, usize>,
    row_num: usize,
}

impl Table {
    /// Open one column per declared field from `<prefix>_col_<i>`. The row
    /// count is the minimum column size, so a partially written column
    /// bounds the visible rows. Null-typed columns own no storage and are
    /// excluded from the minimum.
    pub fn open(prefix: &str, header: &[(String, DataType)]) -> Table {
        let columns: Vec<Column> = header
            .iter()
            .enumerate()
            .map(|(i, (_, data_type))| Column::open(&format!("{prefix}_col_{i}"), *data_type))
            .collect();

        let names = header
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();

        let row_num = columns
            .iter()
            .filter(|c| !c.is_null())
            .map(Column::len)
            .min()
            .unwrap_or(0);

        Table {
            columns,
            header: names,
            row_num,
        }
    }

    pub fn row_num(&self) -> usize {
        self.row_num
    }

    pub fn col_num(&self) -> usize {
        self.columns.len()
    }

    pub fn get_column_by_index(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn get_column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.get(*self.header.get(name)?)
    }
}
