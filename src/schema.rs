//! Description of where tables live.
//!
//! The planner never decides the topology itself, it only reads which
//! keyspace a table belongs to, whether that keyspace is sharded and
//! which column is the sharding key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::{format_smolstr, SmolStr};

use crate::errors::PlanError;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    #[serde(default)]
    pub keyspaces: BTreeMap<SmolStr, Keyspace>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Keyspace {
    #[serde(default)]
    pub sharded: bool,
    #[serde(default)]
    pub tables: BTreeMap<SmolStr, Table>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Table {
    /// Column whose value picks exactly one shard. Required for sharded
    /// keyspaces.
    #[serde(default)]
    pub sharding_key: Option<SmolStr>,
    /// Known columns. An empty list means the column set is unknown.
    #[serde(default)]
    pub columns: Vec<SmolStr>,
}

impl Table {
    /// Unqualified column references and `*` can only be resolved against
    /// tables with a known column set.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        !self.columns.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// A table found in the schema together with its keyspace.
#[derive(Clone, Copy, Debug)]
pub struct TableInfo<'s> {
    pub keyspace_name: &'s SmolStr,
    pub keyspace: &'s Keyspace,
    pub name: &'s SmolStr,
    pub table: &'s Table,
}

impl Schema {
    /// Finds a table either by `keyspace.table` or by a name that is
    /// unique across all keyspaces. Names are compared ignoring ASCII
    /// case, the same way columns and aliases are.
    ///
    /// # Errors
    /// - the table (or keyspace) is unknown
    /// - the name matches more than one table
    pub fn find_table(
        &self,
        keyspace: Option<&str>,
        name: &str,
    ) -> Result<TableInfo<'_>, PlanError> {
        let mut found: Option<TableInfo<'_>> = None;
        for (ks_name, ks) in &self.keyspaces {
            if keyspace.is_some_and(|k| !k.eq_ignore_ascii_case(ks_name)) {
                continue;
            }
            let tables = ks
                .tables
                .iter()
                .filter(|(table_name, _)| table_name.eq_ignore_ascii_case(name));
            for (table_name, table) in tables {
                if found.is_some() {
                    return Err(PlanError::AmbiguousTable(name.into()));
                }
                found = Some(TableInfo {
                    keyspace_name: ks_name,
                    keyspace: ks,
                    name: table_name,
                    table,
                });
            }
        }
        found.ok_or_else(|| match keyspace {
            Some(ks) => PlanError::UnknownTable(format_smolstr!("{ks}.{name}")),
            None => PlanError::UnknownTable(name.into()),
        })
    }

    /// Checks that every sharded table can be routed.
    ///
    /// # Errors
    /// - a table of a sharded keyspace has no sharding key
    /// - a sharding key is missing from a declared column list
    pub fn validate(&self) -> Result<(), String> {
        for (ks_name, ks) in &self.keyspaces {
            for (name, table) in &ks.tables {
                match (&table.sharding_key, ks.sharded) {
                    (None, true) => {
                        return Err(format!(
                            "table {ks_name}.{name} belongs to a sharded keyspace but has no sharding_key"
                        ));
                    }
                    (Some(key), _) if table.is_authoritative() && !table.has_column(key) => {
                        return Err(format!(
                            "sharding_key {key} of table {ks_name}.{name} is not among its columns"
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
