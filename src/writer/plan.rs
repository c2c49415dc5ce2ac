//! The new `MethodDef` order.
//!
//! Methods stay grouped by their declaring type: each type's existing rows are followed by the
//! methods added to it since reading. Rows of later types move down accordingly, so the plan
//! also records where every old row ends up.

use log::debug;

use crate::{
    image::{Image, MethodId},
    metadata::{
        tables::{columns, TableId, TablesHeader},
        token::Token,
    },
    Result,
};

/// Old to new row ids of one table.
///
/// Index 0 is the null row and maps onto itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RidMap {
    table: TableId,
    map: Vec<u32>,
}

impl RidMap {
    /// A map from a list of new row ids, indexed by old row id - 1.
    pub(crate) fn new(table: TableId, new_rids: Vec<u32>) -> Self {
        let mut map = Vec::with_capacity(new_rids.len() + 1);
        map.push(0);
        map.extend(new_rids);
        RidMap { table, map }
    }

    /// The table this map renumbers.
    pub(crate) fn table(&self) -> TableId {
        self.table
    }

    /// New id of row `rid`. Ids past the end of the table are left alone.
    pub(crate) fn get(&self, rid: u32) -> u32 {
        self.map.get(rid as usize).copied().unwrap_or(rid)
    }

    /// Renumbers `token` if it points into this table.
    pub(crate) fn token(&self, token: Token) -> Token {
        if token.table() != self.table as u8 || token.is_null() {
            return token;
        }
        Token::from_parts(self.table, self.get(token.row()))
    }

    /// Whether every row keeps its id.
    pub(crate) fn is_identity(&self) -> bool {
        self.map
            .iter()
            .enumerate()
            .all(|(rid, new)| rid as u32 == *new)
    }
}

/// One row of the new `MethodDef` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlannedMethod {
    /// An existing row, by its old row id
    Existing(u32),
    /// A method added since reading
    Added(MethodId),
}

/// Layout of the new `MethodDef` table.
#[derive(Debug)]
pub(crate) struct MethodPlan {
    /// The new rows, in order
    pub rows: Vec<PlannedMethod>,
    /// Old to new ids of the existing rows
    pub rids: RidMap,
    /// New `MethodList` value of every `TypeDef` row
    pub method_lists: Vec<u32>,
}

impl MethodPlan {
    /// Plan the method table of `image`.
    pub(crate) fn new(image: &Image) -> MethodPlan {
        let old_rows = image.metadata().tables.rows(TableId::MethodDef);

        let mut rows = Vec::with_capacity(image.methods().len());
        let mut new_rids = vec![0u32; old_rows as usize];
        let mut method_lists = Vec::with_capacity(image.types().len());
        let mut next_old = 1;

        let mut place = |rows: &mut Vec<PlannedMethod>, rid: u32| {
            rows.push(PlannedMethod::Existing(rid));
            if let Some(slot) = new_rids.get_mut(rid as usize - 1) {
                *slot = rows.len() as u32;
            }
        };

        for ty in image.types() {
            // Rows no type claims keep their relative position
            if let Some(first) = ty
                .methods
                .iter()
                .find_map(|id| image.method(*id).and_then(|method| method.rid))
            {
                while next_old < first {
                    place(&mut rows, next_old);
                    next_old += 1;
                }
            }

            method_lists.push(rows.len() as u32 + 1);
            for id in &ty.methods {
                match image.method(*id).and_then(|method| method.rid) {
                    Some(rid) => {
                        place(&mut rows, rid);
                        next_old = next_old.max(rid + 1);
                    }
                    None => rows.push(PlannedMethod::Added(*id)),
                }
            }
        }

        while next_old <= old_rows {
            place(&mut rows, next_old);
            next_old += 1;
        }

        let added = rows.len() - old_rows as usize;
        debug!(
            "MethodDef plan: {} rows, {} added",
            rows.len(),
            added
        );

        MethodPlan {
            rows,
            rids: RidMap::new(TableId::MethodDef, new_rids),
            method_lists,
        }
    }

    /// New row id of every added method.
    pub(crate) fn added(&self) -> impl Iterator<Item = (u32, MethodId)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| match row {
                PlannedMethod::Added(id) => Some((index as u32 + 1, *id)),
                PlannedMethod::Existing(_) => None,
            })
    }

    /// Whether the plan adds no rows.
    pub(crate) fn is_unchanged(&self) -> bool {
        self.rows
            .iter()
            .all(|row| matches!(row, PlannedMethod::Existing(_)))
            && self.rids.is_identity()
    }

    /// Rebuild the `MethodDef` rows and the `TypeDef.MethodList` column.
    ///
    /// `added_row` produces the row of an added method; its `ParamList` is filled in here.
    ///
    /// # Errors
    /// Fails if an existing row is missing or an added row cannot be built.
    pub(crate) fn apply<F>(&self, tables: &mut TablesHeader, mut added_row: F) -> Result<()>
    where
        F: FnMut(MethodId) -> Result<Vec<u32>>,
    {
        let old = tables.table(TableId::MethodDef).clone();

        let mut new_rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            match row {
                PlannedMethod::Existing(rid) => match old.row(*rid) {
                    Some(row) => new_rows.push(row.to_vec()),
                    None => return Err(malformed_error!("MethodDef row {} is missing", rid)),
                },
                PlannedMethod::Added(id) => new_rows.push(added_row(*id)?),
            }
        }

        // Added methods own an empty parameter run starting where the next one starts
        let mut next_param = tables.rows(TableId::Param) + 1;
        for (row, planned) in new_rows.iter_mut().zip(&self.rows).rev() {
            match planned {
                PlannedMethod::Added(_) => row[columns::METHOD_PARAM_LIST] = next_param,
                PlannedMethod::Existing(_) => next_param = row[columns::METHOD_PARAM_LIST],
            }
        }

        *tables.table_mut(TableId::MethodDef).rows_mut() = new_rows;

        for (row, method_list) in tables
            .table_mut(TableId::TypeDef)
            .rows_mut()
            .iter_mut()
            .zip(&self.method_lists)
        {
            row[columns::TYPEDEF_METHOD_LIST] = *method_list;
        }

        Ok(())
    }
}
