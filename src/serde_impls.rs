//! Schema documents: tables and enumerations described as data, for schemas
//! that are only known at run time. Tables built from a document produce
//! [`crate::record::Record`] rows.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::schema::{FieldInfo, Schema, TableInfo};
use crate::types::{EnumType, FieldType};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDoc {
    #[serde(default)]
    pub enums: Vec<EnumDoc>,
    #[serde(default)]
    pub tables: Vec<TableDoc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDoc {
    pub name: String,
    pub members: Vec<MemberDoc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// An enumeration member. A bare name takes the previous member's value plus one.
pub enum MemberDoc {
    Name(String),
    Valued { name: String, value: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDoc {
    pub name: String,
    pub fields: Vec<FieldDoc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snake_name: Option<String>,
    /// A type token, see [`FieldType::from_token`].
    #[serde(rename = "type")]
    pub ty: String,
}

impl EnumDoc {
    fn to_enum_type(&self) -> EnumType {
        let mut next = 0i64;
        let members = self
            .members
            .iter()
            .map(|m| {
                let (name, value) = match m {
                    MemberDoc::Name(name) => (name.clone(), next),
                    MemberDoc::Valued { name, value } => (name.clone(), *value),
                };
                next = value.wrapping_add(1);
                (name, value)
            })
            .collect();
        EnumType { name: self.name.clone(), members }
    }
}

impl Schema {
    /// Builds a schema from a document. Type tokens that name neither a
    /// built-in type nor a declared enumeration become [`FieldType::Other`].
    pub fn from_doc(doc: &SchemaDoc) -> Self {
        let enums: HashMap<String, Arc<EnumType>> = doc
            .enums
            .iter()
            .map(|e| (e.name.clone(), Arc::new(e.to_enum_type())))
            .collect();
        let mut schema = Schema::new();
        for table in &doc.tables {
            let fields = table
                .fields
                .iter()
                .map(|f| {
                    let info = FieldInfo::new(f.name.clone(), FieldType::from_token(&f.ty, &enums));
                    match &f.snake_name {
                        Some(snake) => info.with_snake_name(snake.clone()),
                        None => info,
                    }
                })
                .collect();
            schema.insert(TableInfo::dynamic(table.name.clone(), fields));
        }
        schema
    }
}
