use std::collections::HashMap;

use tracing::{debug, warn};

use crate::aliases::{AWAY_TEAM, AliasMap, DATE, HOME_TEAM, TeamNames, header_key};
use crate::csv_table::{Cell, Column, ColumnType, Table};
use crate::error::CombineError;

#[derive(Debug, Clone)]
pub struct CombineOptions {
    pub aliases: AliasMap,
    /// Columns (after alias resolution) that identify the same match.
    pub key_columns: Vec<String>,
    /// Applied to team key cells so spelling variants of one club dedup.
    pub team_names: TeamNames,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            aliases: AliasMap::default_football().clone(),
            key_columns: vec![DATE.to_string(), HOME_TEAM.to_string(), AWAY_TEAM.to_string()],
            team_names: TeamNames::default_football().clone(),
        }
    }
}

/// A column dropped because an earlier column of the same table already
/// resolved to the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredColumn {
    pub table: usize,
    pub column: String,
    pub canonical: String,
}

#[derive(Debug, Clone)]
pub struct CombineOutcome {
    pub table: Table,
    pub rows_in: usize,
    pub duplicates_dropped: usize,
    pub ignored_columns: Vec<IgnoredColumn>,
}

pub fn combine(tables: &[Table], opts: &CombineOptions) -> Result<CombineOutcome, CombineError> {
    let mut columns: Vec<Column> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut mappings: Vec<Vec<Option<usize>>> = Vec::with_capacity(tables.len());
    let mut ignored_columns = Vec::new();

    for (table_idx, table) in tables.iter().enumerate() {
        let mut mapping = vec![None; table.columns().len()];
        let mut claimed: Vec<usize> = Vec::new();
        for (src, column) in table.columns().iter().enumerate() {
            let name = opts.aliases.canonical_name(&column.name)?;
            let key = header_key(&name);
            let dst = match by_key.get(&key) {
                Some(&dst) => dst,
                None => {
                    columns.push(Column {
                        name: name.clone(),
                        ty: ColumnType::Text,
                    });
                    by_key.insert(key, columns.len() - 1);
                    columns.len() - 1
                }
            };
            if claimed.contains(&dst) {
                warn!(table = table_idx, column = %column.name, canonical = %name, "ignoring duplicate column");
                ignored_columns.push(IgnoredColumn {
                    table: table_idx,
                    column: column.name.clone(),
                    canonical: name,
                });
                continue;
            }
            claimed.push(dst);
            mapping[src] = Some(dst);
        }
        mappings.push(mapping);
    }

    // Column types: widen over every source column that actually holds data.
    let mut typed: Vec<Option<ColumnType>> = vec![None; columns.len()];
    for (table, mapping) in tables.iter().zip(&mappings) {
        for (src, dst) in mapping.iter().enumerate() {
            let Some(dst) = *dst else { continue };
            if table.rows().all(|r| r.cells()[src].is_empty()) {
                continue;
            }
            let ty = table.columns()[src].ty;
            typed[dst] = Some(typed[dst].map_or(ty, |t| t.widen(ty)));
        }
    }
    for (column, ty) in columns.iter_mut().zip(typed) {
        column.ty = ty.unwrap_or(ColumnType::Text);
    }

    let team_key_names = [header_key(HOME_TEAM), header_key(AWAY_TEAM)];
    let key_idx: Option<Vec<KeyColumn>> = opts
        .key_columns
        .iter()
        .map(|k| {
            let key = header_key(&opts.aliases.canonical_name(k).ok()?);
            let index = by_key.get(&key).copied()?;
            Some(KeyColumn {
                index,
                is_team: team_key_names.contains(&key),
            })
        })
        .collect();
    if key_idx.is_none() {
        debug!(keys = ?opts.key_columns, "key columns missing from merged schema; no dedup");
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut seen: HashMap<Vec<String>, usize> = HashMap::new();
    let mut rows_in = 0usize;
    let mut duplicates_dropped = 0usize;

    for (table, mapping) in tables.iter().zip(&mappings) {
        for row in table.rows() {
            rows_in += 1;
            let mut cells = vec![Cell::Empty; columns.len()];
            for (src, cell) in row.cells().iter().enumerate() {
                if let Some(dst) = mapping[src] {
                    cells[dst] = cell.clone().coerce(columns[dst].ty);
                }
            }

            let key = key_idx.as_deref().and_then(|idx| dedup_key(&cells, idx, &opts.team_names));
            match key {
                Some(key) => match seen.get(&key) {
                    Some(&pos) => {
                        rows[pos] = cells;
                        duplicates_dropped += 1;
                    }
                    None => {
                        seen.insert(key, rows.len());
                        rows.push(cells);
                    }
                },
                None => rows.push(cells),
            }
        }
    }

    let mut merged = Table::new(columns);
    for cells in rows {
        if let Err(kind) = merged.push_row(cells) {
            warn!(?kind, "dropping row that does not fit merged schema");
        }
    }

    debug!(
        tables = tables.len(),
        rows_in,
        rows_out = merged.len(),
        duplicates_dropped,
        "combined tables"
    );
    Ok(CombineOutcome {
        table: merged,
        rows_in,
        duplicates_dropped,
        ignored_columns,
    })
}

#[derive(Debug, Clone, Copy)]
struct KeyColumn {
    index: usize,
    is_team: bool,
}

fn dedup_key(cells: &[Cell], key_idx: &[KeyColumn], teams: &TeamNames) -> Option<Vec<String>> {
    key_idx
        .iter()
        .map(|k| match &cells[k.index] {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if k.is_team {
                    Some(teams.canonical(s).to_lowercase())
                } else {
                    Some(s.to_lowercase())
                }
            }
            other => Some(other.to_string()),
        })
        .collect()
}
