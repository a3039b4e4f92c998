//! Fixed warehouse queries and the scoped fetch around them.

use crate::config::TablesConfig;
use crate::domain::RawDataset;
use crate::error::GridError;
use crate::warehouse::{ScopedSession, Warehouse};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// The queries this crate knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryName {
    /// Latest snapshot of the layoffs tracker, newest dates first.
    Layoffs,
    /// Every snapshot of the commercial real-estate aggregate table.
    RealEstate,
}

impl QueryName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryName::Layoffs => "layoffs",
            QueryName::RealEstate => "real_estate",
        }
    }

    /// Standard-SQL text for this query against the configured tables.
    pub fn sql(self, tables: &TablesConfig) -> String {
        match self {
            QueryName::Layoffs => {
                let table = &tables.layoffs;
                format!(
                    "SELECT \
                     date(date) as date, \
                     company, \
                     employees_laid_off, \
                     concat(cast(round(percent_laid_off*100,2) as string),\"%\") as percent_laid_off, \
                     datamachine_load_time \
                     FROM `{table}` \
                     WHERE datamachine_load_time = (select max(datamachine_load_time) from `{table}`) \
                     ORDER BY date desc"
                )
            }
            QueryName::RealEstate => format!("select * from `{}`", tables.real_estate),
        }
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run one fixed query and materialize its rows.
///
/// The session is released before returning, whether the query succeeded
/// or not. A query that returns no rows is an error.
pub fn fetch(
    warehouse: &dyn Warehouse,
    tables: &TablesConfig,
    query: QueryName,
) -> Result<RawDataset, GridError> {
    let sql = query.sql(tables);
    let ds = {
        let mut session = ScopedSession::open(warehouse)?;
        session.query(&sql)?
    };

    if ds.is_empty() {
        return Err(GridError::EmptyResult {
            query: query.to_string(),
        });
    }

    info!(
        query = %query,
        warehouse = warehouse.name(),
        rows = ds.len(),
        fingerprint = %ds.fingerprint(),
        "fetched dataset"
    );
    Ok(ds)
}
