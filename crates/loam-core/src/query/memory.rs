use crate::{
    query::{Connection, Direction, Plan, Predicate, Row, StorageError},
    value::Value,
};
use std::{cmp::Ordering, collections::BTreeMap, sync::Mutex};

///
/// Table
///
/// One ordered in-memory table with an auto-incrementing identity counter.
///

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: Vec<Row>,
}

impl Table {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

///
/// MemoryConnection
///
/// Reference `Connection` over in-process ordered tables. Single shared
/// lock, no isolation between operations; the transaction hook runs its
/// callback directly. Tables are created lazily on first write and read as
/// empty before that.
///

#[derive(Debug, Default)]
pub struct MemoryConnection {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemoryConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw table snapshot, for assertions in embedding test suites.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .expect("memory connection lock poisoned")
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

// Resolve a possibly-qualified column against a join context. The first
// binding is always the base table.
fn resolve<'a>(ctx: &[(&str, &'a Row)], base_table: &str, column: &str) -> &'a Value {
    static NULL: Value = Value::Null;

    let (table, name) = match column.split_once('.') {
        Some((table, name)) => (table, name),
        None => (base_table, column),
    };

    ctx.iter()
        .find(|(t, _)| *t == table)
        .and_then(|(_, row)| row.get(name))
        .unwrap_or(&NULL)
}

fn predicate_matches(ctx: &[(&str, &Row)], base_table: &str, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq(column, value) => {
            let found = resolve(ctx, base_table, column);
            !found.is_null() && !value.is_null() && found == value
        }
        Predicate::In(column, values) => {
            let found = resolve(ctx, base_table, column);
            !found.is_null() && values.contains(found)
        }
        Predicate::Null(column) => resolve(ctx, base_table, column).is_null(),
        Predicate::NotNull(column) => !resolve(ctx, base_table, column).is_null(),
    }
}

// Expand one base row into join contexts (nested-loop inner join), then
// keep the contexts that satisfy every predicate.
fn matching_contexts(tables: &BTreeMap<String, Table>, plan: &Plan, base_row: &Row) -> usize {
    let mut contexts: Vec<Vec<(&str, &Row)>> = vec![vec![(plan.table.as_str(), base_row)]];

    for join in &plan.joins {
        let joined = tables.get(&join.table).map(|t| t.rows.as_slice());
        let mut next = Vec::new();

        for ctx in &contexts {
            for row in joined.unwrap_or_default() {
                let mut candidate = ctx.clone();
                candidate.push((join.table.as_str(), row));

                let left = resolve(&candidate, &plan.table, &join.left);
                let right = resolve(&candidate, &plan.table, &join.right);
                if !left.is_null() && left == right {
                    next.push(candidate);
                }
            }
        }

        contexts = next;
    }

    contexts
        .into_iter()
        .filter(|ctx| {
            plan.predicates
                .iter()
                .all(|p| predicate_matches(ctx, &plan.table, p))
        })
        .count()
}

fn order_rows(rows: &mut [Row], plan: &Plan) {
    rows.sort_by(|a, b| {
        for (column, direction) in &plan.order_by {
            let name = column.split_once('.').map_or(column.as_str(), |(_, n)| n);
            let left = a.get(name).unwrap_or(&Value::Null);
            let right = b.get(name).unwrap_or(&Value::Null);

            let ord = match direction {
                Direction::Asc => left.compare(right),
                Direction::Desc => right.compare(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        Ordering::Equal
    });
}

fn window(rows: Vec<Row>, plan: &Plan) -> Vec<Row> {
    let offset = plan.offset.unwrap_or(0);
    let limit = plan.limit.unwrap_or(usize::MAX);

    rows.into_iter().skip(offset).take(limit).collect()
}

impl Connection for MemoryConnection {
    fn select(&self, plan: &Plan) -> Result<Vec<Row>, StorageError> {
        let tables = self.tables.lock().expect("memory connection lock poisoned");

        let base = tables.get(&plan.table).map(|t| t.rows.as_slice());
        let mut out = Vec::new();
        for row in base.unwrap_or_default() {
            // one output row per matching join context
            for _ in 0..matching_contexts(&tables, plan, row) {
                out.push(row.clone());
            }
        }

        order_rows(&mut out, plan);

        Ok(window(out, plan))
    }

    fn count(&self, plan: &Plan) -> Result<u64, StorageError> {
        Ok(self.select(plan)?.len() as u64)
    }

    fn insert(&self, table: &str, row: Row) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().expect("memory connection lock poisoned");
        tables.entry(table.to_string()).or_default().rows.push(row);

        Ok(())
    }

    fn insert_returning_id(
        &self,
        table: &str,
        mut row: Row,
        key: &str,
    ) -> Result<Value, StorageError> {
        let mut tables = self.tables.lock().expect("memory connection lock poisoned");
        let table = tables.entry(table.to_string()).or_default();

        let explicit = match row.get(key) {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        };
        let id = match explicit {
            Some(explicit) => {
                table.next_id = table.next_id.max(explicit);
                explicit
            }
            None => {
                let id = table.allocate_id();
                row.insert(key.to_string(), Value::Int(id));
                id
            }
        };

        table.rows.push(row);

        Ok(Value::Int(id))
    }

    fn update(&self, plan: &Plan, changes: Row) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().expect("memory connection lock poisoned");

        let matched: Vec<usize> = tables
            .get(&plan.table)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| matching_contexts(&tables, plan, row) > 0)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(table) = tables.get_mut(&plan.table) {
            for index in &matched {
                for (column, value) in &changes {
                    table.rows[*index].insert(column.clone(), value.clone());
                }
            }
        }

        Ok(matched.len() as u64)
    }

    fn delete(&self, plan: &Plan) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().expect("memory connection lock poisoned");

        let matched: Vec<usize> = tables
            .get(&plan.table)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| matching_contexts(&tables, plan, row) > 0)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(table) = tables.get_mut(&plan.table) {
            for index in matched.iter().rev() {
                table.rows.remove(*index);
            }
        }

        Ok(matched.len() as u64)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&dyn Connection) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        // no isolation: the callback runs against live tables
        work(self)
    }
}
