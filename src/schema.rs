use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::record::{Column, FromValue, RecordLayout, RowLayout, TypedLayout};
use crate::types::{FieldType, Value};

/// Converts a canonical field name to the snake-case spelling accepted in headers.
/// An uppercase letter after the first starts a new word unless it continues
/// a run of uppercase letters: `ItemId` becomes `item_id`, `WriteIO` becomes `write_io`.
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut prev_upper = true;
    for c in name.chars() {
        let upper = c.is_uppercase();
        if upper {
            if !prev_upper && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
        prev_upper = upper;
    }
    result
}

#[derive(Clone, Debug, PartialEq)]
/// A declared field: its canonical name, its snake-case alias and its type.
pub struct FieldInfo {
    name: String,
    snake_name: String,
    ty: FieldType,
}

impl FieldInfo {
    pub fn new<S: Into<String>>(name: S, ty: FieldType) -> Self {
        let name = name.into();
        let snake_name = to_snake_case(&name);
        Self { name, snake_name, ty }
    }
    /// Replaces the derived snake-case alias.
    #[inline]
    pub fn with_snake_name<S: Into<String>>(mut self, snake_name: S) -> Self {
        self.snake_name = snake_name.into();
        self
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn snake_name(&self) -> &str {
        &self.snake_name
    }
    #[inline]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }
    /// Header names this field answers to, in lookup order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        let canonical = (self.name != self.snake_name).then_some(self.name.as_str());
        std::iter::once(self.snake_name.as_str()).chain(canonical)
    }
}

#[derive(Clone)]
/// One table: its name, its ordered fields and the layout of its row type.
/// Never changes once built.
pub struct TableInfo {
    name: String,
    fields: Vec<FieldInfo>,
    layout: Arc<dyn RowLayout>,
}

impl TableInfo {
    /// Starts defining a table whose rows are `R`.
    #[inline]
    pub fn typed<R: Default + Send + 'static>(name: impl Into<String>) -> TableDef<R> {
        TableDef {
            name: name.into(),
            fields: vec![],
            columns: vec![],
        }
    }
    /// A table whose rows are [`crate::record::Record`]s.
    pub fn dynamic(name: impl Into<String>, fields: Vec<FieldInfo>) -> Self {
        let name = name.into();
        let layout = RecordLayout::new(name.clone(), fields.iter().map(FieldInfo::ty));
        Self { name, fields, layout: Arc::new(layout) }
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }
    #[inline]
    pub fn layout(&self) -> &dyn RowLayout {
        self.layout.as_ref()
    }
    /// The name of the row type.
    #[inline]
    pub fn row_type(&self) -> &str {
        self.layout.type_name()
    }
}

impl Debug for TableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableInfo")
            .field("name", &self.name)
            .field("row_type", &self.row_type())
            .field("fields", &self.fields)
            .finish()
    }
}

/// A table being defined, one field at a time.
pub struct TableDef<R> {
    name: String,
    fields: Vec<FieldInfo>,
    columns: Vec<Column<R>>,
}

impl<R: Default + Send + 'static> TableDef<R> {
    /// Adds a field stored at `lens(row)`.
    pub fn column<T>(mut self, field: FieldInfo, lens: fn(&mut R) -> &mut T) -> Self
    where
        T: FromValue + Into<Value> + Clone + 'static,
    {
        self.fields.push(field);
        self.columns.push(Column::new(lens));
        self
    }
    pub fn build(self) -> TableInfo {
        let Self { name, fields, columns } = self;
        TableInfo {
            name,
            fields,
            layout: Arc::new(TypedLayout::new(columns)),
        }
    }
}

#[derive(Clone, Debug, Default)]
/// Every known table, keyed by name. Read-only once handed to a conversion.
pub struct Schema {
    tables: HashMap<String, TableInfo>,
}

impl Schema {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.insert(table);
        self
    }
    /// Adds a table, returning any table it replaced.
    #[inline]
    pub fn insert(&mut self, table: TableInfo) -> Option<TableInfo> {
        self.tables.insert(table.name.clone(), table)
    }
    #[inline]
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }
    #[inline]
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
