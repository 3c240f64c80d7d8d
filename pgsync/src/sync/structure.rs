use tracing::debug;

use crate::bail;
use crate::clients::base::{Catalog, SyncTarget};
use crate::error::{ErrorKind, SyncResult};
use crate::schema::{TableRef, TableSchema};

/// Reads the structure of `table` from the source catalog.
///
/// A table missing from the catalog yields `Ok(None)`, which callers treat as nothing to create.
pub async fn introspect_table<S>(source: &S, table: &TableRef) -> SyncResult<Option<TableSchema>>
where
    S: Catalog,
{
    let table_schema = source.get_table_schema(table).await?;

    match &table_schema {
        Some(table_schema) => debug!(
            table = %table,
            source_table = %table_schema.name,
            columns = table_schema.column_schemas.len(),
            "introspected source table"
        ),
        None => debug!(table = %table, "table not found in the source catalog"),
    }

    Ok(table_schema)
}

/// Creates the table described by `table_schema` on the target unless it already exists.
///
/// Returns the executed statement.
pub async fn apply_table_structure<T>(target: &T, table_schema: &TableSchema) -> SyncResult<String>
where
    T: SyncTarget,
{
    let statement = table_schema.create_table_statement();
    target.execute_statement(&statement).await?;

    debug!(table = %table_schema.name, %statement, "applied table structure on the target");

    Ok(statement)
}

/// Checks that rows of `source_schema` can be copied in binary form into the target table with the
/// same name.
pub async fn validate_target_layout<T>(target: &T, source_schema: &TableSchema) -> SyncResult<()>
where
    T: Catalog,
{
    let target_ref = TableRef::from(source_schema.name.clone());
    let Some(target_schema) = target.get_table_schema(&target_ref).await? else {
        bail!(
            ErrorKind::SchemaMismatch,
            "Target table does not exist",
            source_schema.name
        );
    };

    if let Some(mismatch) = source_schema.layout_mismatch(&target_schema) {
        bail!(
            ErrorKind::SchemaMismatch,
            "Target table layout differs from the source",
            mismatch
        );
    }

    Ok(())
}
