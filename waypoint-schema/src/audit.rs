//! Registry versus physical schema comparison.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use waypoint_core::{ColumnDefinition, DataType};

/// Physical field whose type differs from its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDrift {
    pub field_key: String,
    pub registered: DataType,
    pub physical: DataType,
}

/// Differences between the registry and the records table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAudit {
    /// Registered definitions with no physical field
    pub orphaned: Vec<ColumnDefinition>,
    /// Physical fields with no definition
    pub unregistered: Vec<(String, DataType)>,
    pub drifted: Vec<TypeDrift>,
}

impl SchemaAudit {
    pub fn compare(columns: &[ColumnDefinition], physical: &[(String, DataType)]) -> Self {
        let physical_map: BTreeMap<&str, DataType> =
            physical.iter().map(|(k, t)| (k.as_str(), *t)).collect();
        let registered: HashSet<&str> = columns.iter().map(|c| c.field_key.as_str()).collect();

        let mut audit = Self::default();
        for column in columns {
            match physical_map.get(column.field_key.as_str()) {
                None => audit.orphaned.push(column.clone()),
                Some(data_type) if *data_type != column.data_type => {
                    audit.drifted.push(TypeDrift {
                        field_key: column.field_key.clone(),
                        registered: column.data_type,
                        physical: *data_type,
                    })
                }
                Some(_) => {}
            }
        }
        audit.unregistered = physical
            .iter()
            .filter(|(k, _)| !registered.contains(k.as_str()))
            .cloned()
            .collect();
        audit
    }

    /// True if registry and records table agree.
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.unregistered.is_empty() && self.drifted.is_empty()
    }
}
