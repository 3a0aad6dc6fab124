//! The `sample_data` table: key/value rows with a generated id and insert time.
//!
//! Rows are only ever inserted, listed and deleted. Records serialize with the
//! column names the browser expects: `Id`, `TimeGenerated`, `Key`, `Value`.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{ColumnDef, Expr, Table, TableCreateStatement, TableDropStatement};
use sea_orm::{ConnectionTrait, DbBackend, DeriveIden, QueryOrder, Set, Statement};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sample_data")]
#[serde(rename_all = "PascalCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub time_generated: DateTime,
    pub key: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(DeriveIden)]
enum SampleData { Table, Id, TimeGenerated, Key, Value }

pub fn drop_table_statement() -> TableDropStatement {
    Table::drop().table(SampleData::Table).if_exists().to_owned()
}

pub fn create_table_statement() -> TableCreateStatement {
    Table::create()
        .table(SampleData::Table)
        .col(
            ColumnDef::new(SampleData::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(SampleData::TimeGenerated)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(SampleData::Key).string_len(255).not_null())
        .col(ColumnDef::new(SampleData::Value).text().null())
        .to_owned()
}

/// Database clock and version, as reported by the server itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProbe {
    pub current_date_time: String,
    pub sql_version: String,
}

pub fn validate_entry(key: &str, value: &str) -> Result<(), ModelError> {
    if key.is_empty() || value.is_empty() {
        return Err(ModelError::Validation("Both key and value required".into()));
    }
    Ok(())
}

/// Trivial round trip used by readiness checks.
pub async fn ping(db: &DatabaseConnection) -> Result<(), ModelError> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "SELECT 1")).await?;
    Ok(())
}

/// Drop the table if present and create it again. Existing rows are lost.
pub async fn reset_table(db: &DatabaseConnection) -> Result<(), ModelError> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&drop_table_statement())).await?;
    db.execute(backend.build(&create_table_statement())).await?;
    Ok(())
}

pub async fn server_probe(db: &DatabaseConnection) -> Result<ServerProbe, ModelError> {
    let backend = db.get_database_backend();
    let sql = match backend {
        DbBackend::Postgres => {
            "SELECT CAST(CURRENT_TIMESTAMP AS TEXT) AS current_date_time, version() AS sql_version"
        }
        DbBackend::Sqlite => {
            "SELECT CURRENT_TIMESTAMP AS current_date_time, 'SQLite ' || sqlite_version() AS sql_version"
        }
        _ => "SELECT CAST(CURRENT_TIMESTAMP AS CHAR) AS current_date_time, version() AS sql_version",
    };
    let row = db
        .query_one(Statement::from_string(backend, sql))
        .await?
        .ok_or_else(|| ModelError::Db("server probe returned no rows".into()))?;
    Ok(ServerProbe {
        current_date_time: row.try_get("", "current_date_time")?,
        sql_version: row.try_get("", "sql_version")?,
    })
}

/// Insert a row and return it as stored, including the generated `Id` and `TimeGenerated`.
pub async fn create(db: &DatabaseConnection, key: &str, value: &str) -> Result<Model, ModelError> {
    validate_entry(key, value)?;
    let am = ActiveModel {
        key: Set(key.to_string()),
        value: Set(Some(value.to_string())),
        ..Default::default()
    };
    Ok(am.insert(db).await?)
}

/// All rows, most recent insert first.
pub async fn list_latest_first(db: &DatabaseConnection) -> Result<Vec<Model>, ModelError> {
    Ok(Entity::find().order_by_desc(Column::Id).all(db).await?)
}

/// Returns `false` when no row had that id.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, ModelError> {
    let res = Entity::delete_by_id(id).exec(db).await?;
    Ok(res.rows_affected > 0)
}
