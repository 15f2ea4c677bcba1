//! Symbol table of a statement: which route owns a column, a select list
//! item or an alias.

use ahash::AHashMap;
use smol_str::{format_smolstr, SmolStr, ToSmolStr};

use crate::errors::PlanError;
use crate::ir::helpers::ColumnRef;
use crate::ir::{NodeId, Plan};

/// Table visible in the FROM clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSymbol {
    /// Alias, or the table name when there is no alias.
    pub alias: SmolStr,
    pub keyspace: SmolStr,
    /// Empty when the column set is unknown.
    pub columns: Vec<SmolStr>,
    pub route: NodeId,
}

impl TableSymbol {
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        !self.columns.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Select list item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectSymbol {
    pub alias: Option<SmolStr>,
    pub route: NodeId,
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    tables: Vec<TableSymbol>,
    /// Lowercased alias -> position in `tables`.
    aliases: AHashMap<SmolStr, usize>,
    select_symbols: Vec<SelectSymbol>,
    /// (order, route) sorted by order.
    routes: Vec<(usize, NodeId)>,
}

fn lowercase(name: &str) -> SmolStr {
    name.to_ascii_lowercase().to_smolstr()
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a FROM clause table executed by the route with the given
    /// order.
    ///
    /// # Errors
    /// - the alias is already taken
    pub fn add_table(&mut self, table: TableSymbol, order: usize) -> Result<(), PlanError> {
        let key = lowercase(&table.alias);
        if self.aliases.contains_key(&key) {
            return Err(PlanError::DuplicateAlias(table.alias));
        }
        if !self.routes.iter().any(|(_, id)| *id == table.route) {
            let pos = self.routes.partition_point(|(o, _)| *o <= order);
            self.routes.insert(pos, (order, table.route));
        }
        self.aliases.insert(key, self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    pub fn add_select_symbol(&mut self, symbol: SelectSymbol) {
        self.select_symbols.push(symbol);
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSymbol> {
        self.tables.iter()
    }

    #[must_use]
    pub fn table_by_route(&self, route: NodeId) -> Option<&TableSymbol> {
        self.tables.iter().find(|t| t.route == route)
    }

    #[must_use]
    pub fn select_len(&self) -> usize {
        self.select_symbols.len()
    }

    /// Routes in execution order.
    pub fn routes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.routes.iter().map(|(_, id)| *id)
    }

    /// The syntactically first route, the owner of clauses that reference
    /// no columns.
    ///
    /// # Errors
    /// - no tables were registered
    pub fn first_route(&self) -> Result<NodeId, PlanError> {
        self.routes.first().map(|(_, id)| *id).ok_or(PlanError::EmptyPlan)
    }

    /// Resolves a column against the tables in scope.
    ///
    /// An unqualified name is looked up in the tables with known columns
    /// first and falls back to the tables whose columns are unknown.
    ///
    /// # Errors
    /// - the column (or its qualifier) is not in scope
    /// - the column matches tables of more than one route
    pub fn resolve_column(&self, column: &ColumnRef) -> Result<NodeId, PlanError> {
        if let Some(qualifier) = &column.qualifier {
            let table = self
                .aliases
                .get(&lowercase(qualifier))
                .map(|pos| &self.tables[*pos])
                .ok_or_else(|| PlanError::UndefinedColumn(column.to_smolstr()))?;
            if table.is_authoritative() && !table.has_column(&column.name) {
                return Err(PlanError::UndefinedColumn(column.to_smolstr()));
            }
            return Ok(table.route);
        }

        let known = self.tables.iter().filter(|t| t.has_column(&column.name));
        if let Some(route) = Self::unique_route(known, column)? {
            return Ok(route);
        }
        let unknown = self.tables.iter().filter(|t| !t.is_authoritative());
        Self::unique_route(unknown, column)?
            .ok_or_else(|| PlanError::UndefinedColumn(column.to_smolstr()))
    }

    fn unique_route<'t>(
        candidates: impl Iterator<Item = &'t TableSymbol>,
        column: &ColumnRef,
    ) -> Result<Option<NodeId>, PlanError> {
        let mut owner = None;
        for table in candidates {
            match owner {
                None => owner = Some(table.route),
                Some(route) if route != table.route => {
                    return Err(PlanError::AmbiguousColumn(column.to_smolstr()));
                }
                Some(_) => {}
            }
        }
        Ok(owner)
    }

    /// Resolves a name used by a clause evaluated after the projection:
    /// an unqualified name matching a select list alias belongs to the
    /// route of that item, otherwise it's a table column.
    ///
    /// # Errors
    /// - see [`SymbolTable::resolve_column`]
    /// - the alias is given to items of different routes
    pub fn resolve_clause_column(&self, column: &ColumnRef) -> Result<NodeId, PlanError> {
        if column.qualifier.is_none() {
            let mut aliased = self.select_symbols.iter().filter(|s| {
                s.alias
                    .as_ref()
                    .is_some_and(|alias| alias.eq_ignore_ascii_case(&column.name))
            });
            if let Some(first) = aliased.next() {
                if aliased.any(|s| s.route != first.route) {
                    return Err(PlanError::AmbiguousColumn(column.name.clone()));
                }
                return Ok(first.route);
            }
        }
        self.resolve_column(column)
    }

    /// Route of the n-th (1-based) select list item.
    ///
    /// # Errors
    /// - `ordinal` is outside `[1, select_len]`
    pub fn resolve_ordinal(&self, ordinal: i64) -> Result<NodeId, PlanError> {
        let out_of_range = || PlanError::OrdinalOutOfRange {
            ordinal,
            len: self.select_symbols.len(),
        };
        let pos = usize::try_from(ordinal)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(out_of_range)?;
        self.select_symbols
            .get(pos)
            .map(|symbol| symbol.route)
            .ok_or_else(out_of_range)
    }

    /// Route of the n-th (1-based) select list item together with the
    /// item's position among the items selected by that route.
    ///
    /// # Errors
    /// - see [`SymbolTable::resolve_ordinal`]
    pub fn resolve_route_ordinal(&self, ordinal: i64) -> Result<(NodeId, usize), PlanError> {
        let route = self.resolve_ordinal(ordinal)?;
        let pos = usize::try_from(ordinal - 1).unwrap_or_default();
        let local = self.select_symbols[..pos]
            .iter()
            .filter(|symbol| symbol.route == route)
            .count();
        Ok((route, local + 1))
    }

    /// Checks that every route of the plan is known to the table.
    ///
    /// # Errors
    /// - a reachable route was never registered
    pub fn check_coverage(&self, plan: &Plan) -> Result<(), PlanError> {
        for route in plan.routes()? {
            if !self.routes.iter().any(|(_, id)| *id == route) {
                return Err(PlanError::UnregisteredRoute(plan.get_route(route)?.order));
            }
        }
        Ok(())
    }

    /// Join variable name for a column of another route: `<table>_<column>`.
    #[must_use]
    pub fn join_var_name(&self, column: &ColumnRef, route: NodeId) -> (SmolStr, ColumnRef) {
        let qualifier = match (&column.qualifier, self.table_by_route(route)) {
            (Some(qualifier), _) => qualifier.clone(),
            (None, Some(table)) => table.alias.clone(),
            (None, None) => SmolStr::default(),
        };
        let name = format_smolstr!("{qualifier}_{}", column.name);
        (name, ColumnRef::new(Some(&qualifier), &column.name))
    }
}
