use indexmap::IndexMap;

use crate::column::{role, Column, Value};
use crate::error::{Error, Result};

/// An ordered, named collection of equal-length columns plus a separate
/// ordered dictionary of scalar metadata (spec §3), carrying the metadata a
/// raster-sampling pipeline stage needs: whether the frame is still being
/// produced (`active`), whether an upstream stage failed (`in_error`), and
/// the CRS its X/Y columns are expressed in.
pub struct DataFrame {
    columns: IndexMap<String, Column>,
    metadata: IndexMap<String, Value>,
    pub active: bool,
    pub in_error: bool,
    pub target_crs: Option<u32>,
}

impl DataFrame {
    pub fn new() -> Self {
        DataFrame {
            columns: IndexMap::new(),
            metadata: IndexMap::new(),
            active: true,
            in_error: false,
            target_crs: None,
        }
    }

    pub fn add_column(&mut self, name: &str, column: Column) -> Result<()> {
        if self.columns.contains_key(name) {
            return Err(Error::DuplicateColumn { name: name.to_string() });
        }
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    /// Inserts `column`, replacing any existing column of the same name.
    pub fn set_column(&mut self, name: &str, column: Column) {
        self.columns.insert(name.to_string(), column);
    }

    pub fn delete_column(&mut self, name: &str) -> Result<Column> {
        self.columns.shift_remove(name).ok_or_else(|| Error::UnknownColumn { name: name.to_string() })
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        self.columns.get(name).ok_or_else(|| Error::UnknownColumn { name: name.to_string() })
    }

    pub fn get_column_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns.get_mut(name).ok_or_else(|| Error::UnknownColumn { name: name.to_string() })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.values().next().map(Column::len).unwrap_or(0)
    }

    /// Finds the first column whose encoding carries `role_bit`, e.g. the X
    /// coordinate column a sampler should drive point construction from.
    pub fn column_with_role(&self, role_bit: u32) -> Option<(&str, &Column)> {
        self.columns.iter().find(|(_, col)| col.encoding().has_role(role_bit)).map(|(n, c)| (n.as_str(), c))
    }

    pub fn x_column(&self) -> Option<(&str, &Column)> {
        self.column_with_role(role::X)
    }

    pub fn y_column(&self) -> Option<(&str, &Column)> {
        self.column_with_role(role::Y)
    }

    pub fn set_metadata(&mut self, name: &str, value: impl Into<Value>) {
        self.metadata.insert(name.to_string(), value.into());
    }

    pub fn metadata(&self, name: &str) -> Option<&Value> {
        self.metadata.get(name)
    }

    pub fn metadata_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(String::as_str)
    }
}

impl Default for DataFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ElementType, Encoding};

    fn scalar_col(values: &[f64]) -> Column {
        let mut col = Column::scalar(Encoding::scalar(ElementType::F64));
        for &v in values {
            col.push_scalar(v);
        }
        col
    }

    #[test]
    fn add_column_rejects_duplicate_names() {
        let mut df = DataFrame::new();
        df.add_column("x", scalar_col(&[1.0])).unwrap();
        assert!(matches!(df.add_column("x", scalar_col(&[2.0])), Err(Error::DuplicateColumn { .. })));
    }

    #[test]
    fn delete_column_removes_and_returns_it() {
        let mut df = DataFrame::new();
        df.add_column("x", scalar_col(&[1.0, 2.0])).unwrap();
        let removed = df.delete_column("x").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(df.get_column("x").is_err());
    }

    #[test]
    fn column_with_role_finds_the_marked_column() {
        let mut df = DataFrame::new();
        let mut x = Column::scalar(Encoding::scalar(ElementType::F64).with_roles(role::X));
        x.push_scalar(10.0);
        df.add_column("lon", x).unwrap();

        let (name, _) = df.x_column().unwrap();
        assert_eq!(name, "lon");
    }
}
