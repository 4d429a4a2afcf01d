//! End-to-end tests against SQLite: emit, apply, introspect

mod common;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use dbvc::config::ConnectionConfig;
use dbvc::db::{apply_script, CancellationToken, Connector, DatabaseConnection, SqliteConnector};
use dbvc::schema::diff::SchemaDiff;
use dbvc::schema::{
    create_change_sql, export_sql, load_from_live, Column, DataType, Dialect, KeyRole, Schema, Table,
};
use dbvc::{config, DbvcClient, Error};

fn connector() -> SqliteConnector {
    SqliteConnector::new(ConnectionConfig {
        host: String::new(),
        database_name: "shop".to_string(),
        username: String::new(),
        password: String::new(),
    })
}

async fn database_with(schema: &Schema) -> DatabaseConnection {
    let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
    let script = export_sql(schema, Dialect::Sqlite).unwrap();
    apply_script(&mut conn, &script, &CancellationToken::new())
        .await
        .unwrap();
    conn
}

async fn introspect(conn: &mut DatabaseConnection) -> Schema {
    load_from_live(&connector(), conn, "shop", &["Status".to_string()])
        .await
        .unwrap()
}

async fn introspect_tables(conn: &mut DatabaseConnection) -> Schema {
    load_from_live(&connector(), conn, "shop", &[]).await.unwrap()
}

async fn migrate(conn: &mut DatabaseConnection, authoritative: &Schema) -> Schema {
    let before = introspect_tables(conn).await;
    let script = connector().create_change_sql(authoritative, &before).unwrap();
    apply_script(conn, &script, &CancellationToken::new())
        .await
        .unwrap();
    introspect_tables(conn).await
}

fn stock(columns: Vec<Column>) -> Schema {
    let table = columns.into_iter().fold(
        Table::new("Stock").with_column(
            Column::new("StockID", DataType::Int)
                .native("int(11)")
                .key(KeyRole::Primary),
        ),
        Table::with_column,
    );
    Schema::new("shop").with_table(table)
}

#[tokio::test]
async fn key_roles_survive_emit_and_introspect() {
    let authoritative = common::shop();
    let mut conn = database_with(&authoritative).await;
    let live = introspect(&mut conn).await;

    for (name, table) in &authoritative.tables {
        let live_table = live.table(name).unwrap();
        for (column_name, column) in &table.columns {
            assert_eq!(
                live_table.columns[column_name].column_key,
                column.column_key,
                "{}.{}",
                name,
                column_name
            );
        }
    }
    assert_eq!(live.tables["Users"].columns["UserID"].extra, "auto_increment");
    assert_eq!(live.enums["Status"], authoritative.enums["Status"]);
    assert!(SchemaDiff::generate(&authoritative, &live, Dialect::Sqlite)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn migrating_an_outdated_database_converges() {
    let authoritative = common::shop();
    let mut conn = database_with(&common::shop_outdated()).await;
    conn.execute(
        "INSERT INTO Users (UserID, Email, Legacy, Balance, Created) VALUES \
         (1, 'a@example.com', 7, 12.5, NULL), \
         (2, 'b@example.com', NULL, 3, '2024-01-02 03:04:05')",
    )
    .await
    .unwrap();

    let before = introspect(&mut conn).await;
    let script = connector().create_change_sql(&authoritative, &before).unwrap();
    assert!(script.contains("RENAME COLUMN Balance TO Balance__old"));
    apply_script(&mut conn, &script, &CancellationToken::new())
        .await
        .unwrap();

    let after = introspect(&mut conn).await;
    assert_eq!(after.tables.keys().collect::<Vec<_>>(), vec!["Orders", "Status", "Users"]);
    assert_eq!(after.tables["Users"].columns["Email"].column_key, KeyRole::Unique);
    assert_eq!(after.enums["Status"].len(), 2);
    assert_eq!(create_change_sql(&authoritative, &after, Dialect::Sqlite).unwrap(), "");

    let users: Vec<(i64, String, f64, Option<String>)> = sqlx::query_as(
        "SELECT UserID, Email, CAST(Balance AS REAL), Created FROM Users ORDER BY UserID",
    )
    .fetch_all(conn.as_sqlite().unwrap())
    .await
    .unwrap();
    assert_eq!(
        users,
        vec![
            (1, "a@example.com".to_string(), 12.5, None),
            (2, "b@example.com".to_string(), 3.0, Some("2024-01-02 03:04:05".to_string())),
        ]
    );
}

#[tokio::test]
async fn not_null_columns_are_added_to_populated_tables() {
    let mut conn = database_with(&stock(Vec::new())).await;
    conn.execute("INSERT INTO Stock (StockID) VALUES (1), (2)")
        .await
        .unwrap();

    let authoritative = stock(vec![
        Column::new("Qty", DataType::Int).native("int(11)"),
        Column::new("Price", DataType::Decimal).native("decimal(10,2)").precision(10, 2),
        Column::new("Bin", DataType::Varchar).native("varchar(8)").max_length(8),
    ]);
    let after = migrate(&mut conn, &authoritative).await;

    let rows: Vec<(i64, i64, f64, String)> =
        sqlx::query_as("SELECT StockID, Qty, CAST(Price AS REAL), Bin FROM Stock ORDER BY StockID")
            .fetch_all(conn.as_sqlite().unwrap())
            .await
            .unwrap();
    assert_eq!(rows, vec![(1, 0, 0.0, String::new()), (2, 0, 0.0, String::new())]);
    assert_eq!(create_change_sql(&authoritative, &after, Dialect::Sqlite).unwrap(), "");
}

#[tokio::test]
async fn rebuilt_columns_keep_their_rows_and_index() {
    let qty = || {
        Column::new("Qty", DataType::Int)
            .native("int(11)")
            .key(KeyRole::Multi)
    };
    let mut conn = database_with(&stock(vec![qty().nullable(true)])).await;
    conn.execute("INSERT INTO Stock (StockID, Qty) VALUES (1, NULL), (2, 5)")
        .await
        .unwrap();

    let authoritative = stock(vec![qty()]);
    let after = migrate(&mut conn, &authoritative).await;

    let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT StockID, Qty FROM Stock ORDER BY StockID")
        .fetch_all(conn.as_sqlite().unwrap())
        .await
        .unwrap();
    assert_eq!(rows, vec![(1, 0), (2, 5)]);

    let column = &after.tables["Stock"].columns["Qty"];
    assert!(!column.is_nullable);
    assert_eq!(column.column_key, KeyRole::Multi);
    assert_eq!(create_change_sql(&authoritative, &after, Dialect::Sqlite).unwrap(), "");
}

#[tokio::test]
async fn reserved_word_columns_migrate() {
    let order = || Column::new("Order", DataType::Int).native("int(11)");
    let mut conn = database_with(&stock(vec![order().nullable(true)])).await;
    conn.execute("INSERT INTO Stock (StockID, `Order`) VALUES (1, 4)")
        .await
        .unwrap();

    let authoritative = stock(vec![order()]);
    let after = migrate(&mut conn, &authoritative).await;

    let order: i64 = sqlx::query_scalar("SELECT `Order` FROM Stock")
        .fetch_one(conn.as_sqlite().unwrap())
        .await
        .unwrap();
    assert_eq!(order, 4);
    assert_eq!(create_change_sql(&authoritative, &after, Dialect::Sqlite).unwrap(), "");
}

#[tokio::test]
async fn backslash_rows_apply_verbatim() {
    let authoritative = common::paths();
    let mut conn = database_with(&authoritative).await;

    let dir: String = sqlx::query_scalar("SELECT Dir FROM Paths WHERE PathID = 3")
        .fetch_one(conn.as_sqlite().unwrap())
        .await
        .unwrap();
    assert_eq!(dir, r"a\'b");

    let live = load_from_live(&connector(), &mut conn, "shop", &["Paths".to_string()])
        .await
        .unwrap();
    assert_eq!(live.enums["Paths"], authoritative.enums["Paths"]);
    assert_eq!(create_change_sql(&authoritative, &live, Dialect::Sqlite).unwrap(), "");
}

#[tokio::test]
async fn failed_statement_rolls_back_the_whole_script() {
    let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
    let script = "CREATE TABLE First (id INTEGER);\nINSERT INTO Missing VALUES (1);\nCREATE TABLE Third (id INTEGER);\n";

    let err = apply_script(&mut conn, script, &CancellationToken::new())
        .await
        .unwrap_err();
    let Error::Apply { statement, message } = err else {
        panic!("expected an apply error, got {:?}", err);
    };
    assert_eq!(statement, "INSERT INTO Missing VALUES (1)");
    assert!(message.contains("no such table"), "{}", message);

    let live = load_from_live(&connector(), &mut conn, "shop", &[]).await.unwrap();
    assert!(live.tables.is_empty());
}

#[tokio::test]
async fn missing_enum_table_is_an_introspection_error() {
    let mut conn = DatabaseConnection::sqlite_in_memory().await.unwrap();
    let err = load_from_live(&connector(), &mut conn, "shop", &["Status".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Introspection(_)));
}

#[tokio::test]
async fn client_imports_compares_and_exports() {
    let dir = tempdir().unwrap();
    let toml = format!(
        r#"
        database_type = "sqlite"
        enums = ["Status"]
        schema_file = "{dir}/shop.schema.json"
        cache_file = "{dir}/shop.signatures.json"

        [connection]
        host = "{dir}"
        database_name = "shop"
        "#,
        dir = dir.path().display()
    );
    let config = config::parse(&toml).unwrap();
    let mut client = DbvcClient::new(config).await.unwrap();

    let script = export_sql(&common::shop(), Dialect::Sqlite).unwrap();
    let applied = client
        .apply_script(&script, &CancellationToken::new())
        .await
        .unwrap();
    assert!(applied > 0);
    assert!(dir.path().join("shop.db").exists());

    let imported = client.import_schema().await.unwrap();
    assert_eq!(imported.tables.len(), 3);
    assert!(dir.path().join("shop.schema.json").exists());
    assert!(dir.path().join("shop.signatures.json").exists());

    assert_eq!(client.compare(false).await.unwrap(), "");
    assert_eq!(client.compare(true).await.unwrap(), "");
    assert!(client.export_sql().unwrap().contains("CREATE UNIQUE INDEX ui_Users_Email ON Users (Email)"));

    client.close().await.unwrap();
}
