use async_trait::async_trait;
use columns_on_demand::{ColumnSet, SelectRows};
use parking_lot::Mutex;
use sea_orm::{
    ColumnType, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement, Value,
};
use std::sync::Arc;

#[cfg(test)]
#[allow(dead_code)]
pub async fn setup_test_db() -> DatabaseConnection {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db
}

#[allow(dead_code)]
pub async fn setup_docs(db: &DatabaseConnection) -> ColumnSet {
    db.execute_unprepared(
        "CREATE TABLE docs (
            id INTEGER PRIMARY KEY,
            name VARCHAR(255),
            blob_data BLOB,
            log TEXT
        );
        INSERT INTO docs (id, name, blob_data, log) VALUES (1, 'first', X'68656C6C6F', 'started');
        INSERT INTO docs (id, name, blob_data, log) VALUES (2, 'second', NULL, '');",
    )
    .await
    .unwrap();
    ColumnSet::introspect(db, "docs").await.unwrap()
}

#[allow(dead_code)]
pub async fn setup_items(db: &DatabaseConnection) -> ColumnSet {
    db.execute_unprepared(
        "CREATE TABLE items (
            id INTEGER PRIMARY KEY,
            type VARCHAR(64),
            shared_text TEXT,
            a_int INTEGER,
            b_int INTEGER
        );
        INSERT INTO items (id, type, shared_text, a_int, b_int) VALUES (1, 'Item', 'base', 1, 2);
        INSERT INTO items (id, type, shared_text, a_int, b_int) VALUES (2, 'SpecialItem', 'special', 3, 4);
        INSERT INTO items (id, type, shared_text, a_int, b_int) VALUES (3, 'SpecialItem', NULL, 5, 6);",
    )
    .await
    .unwrap();
    ColumnSet::introspect(db, "items").await.unwrap()
}

/// Connection wrapper that records every SELECT it runs
#[derive(Clone)]
pub struct QueryLog {
    pub db: DatabaseConnection,
    statements: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl QueryLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn count(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.statements.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.statements.lock().clear();
    }
}

#[async_trait]
impl SelectRows for QueryLog {
    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr> {
        self.statements.lock().push(stmt.to_string());
        self.db.select_rows(stmt, column_types).await
    }
}
