//! Schemas shared by the integration tests

#![allow(dead_code)]

use serde_json::json;

use dbvc::schema::{Column, DataType, EnumRow, KeyRole, Schema, Table};

pub fn row(id: i64, label: &str) -> EnumRow {
    let mut row = EnumRow::new();
    row.insert("StatusID".to_string(), json!(id));
    row.insert("Label".to_string(), json!(label));
    row
}

fn user_id() -> Column {
    Column::new("UserID", DataType::Int)
        .native("int(11)")
        .precision(10, 0)
        .key(KeyRole::Primary)
        .extra("auto_increment")
}

fn email(role: KeyRole) -> Column {
    Column::new("Email", DataType::Varchar)
        .native("varchar(255)")
        .max_length(255)
        .key(role)
}

fn status() -> Table {
    Table::new("Status")
        .engine("InnoDB")
        .with_column(
            Column::new("StatusID", DataType::Int)
                .native("int(11)")
                .precision(10, 0)
                .key(KeyRole::Primary),
        )
        .with_column(Column::new("Label", DataType::Varchar).native("varchar(32)").max_length(32))
}

/// The authoritative shop schema
pub fn shop() -> Schema {
    let users = Table::new("Users")
        .engine("InnoDB")
        .collation("utf8mb4_general_ci")
        .with_column(user_id())
        .with_column(email(KeyRole::Unique))
        .with_column(
            Column::new("Name", DataType::Varchar)
                .native("varchar(64)")
                .max_length(64)
                .nullable(true)
                .key(KeyRole::Multi),
        )
        .with_column(
            Column::new("Balance", DataType::Decimal)
                .native("decimal(10,2)")
                .precision(10, 2)
                .default("0.00"),
        )
        .with_column(Column::new("Created", DataType::DateTime).native("datetime").nullable(true));

    let orders = Table::new("Orders")
        .engine("InnoDB")
        .with_column(
            Column::new("OrderID", DataType::BigInt)
                .native("bigint(20)")
                .precision(19, 0)
                .key(KeyRole::Primary),
        )
        .with_column(
            Column::new("UserID", DataType::Int)
                .native("int(11)")
                .precision(10, 0)
                .key(KeyRole::Multi),
        )
        .with_column(Column::new("Note", DataType::Text).native("text").nullable(true));

    Schema::new("shop")
        .with_table(users)
        .with_table(orders)
        .with_table(status())
        .with_enum_rows("Status", vec![row(1, "open"), row(2, "closed")])
}

/// An older revision of the shop schema that differs in every way the
/// diff engine knows about
pub fn shop_outdated() -> Schema {
    let users = Table::new("Users")
        .engine("InnoDB")
        .with_column(user_id())
        .with_column(email(KeyRole::Multi))
        .with_column(
            Column::new("Legacy", DataType::Int)
                .native("int(11)")
                .precision(10, 0)
                .nullable(true)
                .key(KeyRole::Multi),
        )
        .with_column(
            Column::new("Balance", DataType::Decimal)
                .native("decimal(8,2)")
                .precision(8, 2)
                .default("0"),
        )
        .with_column(Column::new("Created", DataType::DateTime).native("datetime").nullable(true));

    let archive = Table::new("Archive").with_column(
        Column::new("ArchiveID", DataType::Int)
            .native("int(11)")
            .precision(10, 0)
            .key(KeyRole::Primary),
    );

    Schema::new("shop")
        .with_table(users)
        .with_table(archive)
        .with_table(status())
        .with_enum_rows("Status", vec![row(1, "open")])
}

/// An enum table whose labels carry backslashes
pub fn paths() -> Schema {
    let table = Table::new("Paths")
        .with_column(
            Column::new("PathID", DataType::Int)
                .native("int(11)")
                .precision(10, 0)
                .key(KeyRole::Primary),
        )
        .with_column(Column::new("Dir", DataType::Varchar).native("varchar(16)").max_length(16));
    let rows = [(1, "C:\\"), (2, "ok"), (3, r"a\'b")]
        .into_iter()
        .map(|(id, dir)| {
            let mut row = EnumRow::new();
            row.insert("PathID".to_string(), json!(id));
            row.insert("Dir".to_string(), json!(dir));
            row
        })
        .collect();
    Schema::new("shop").with_table(table).with_enum_rows("Paths", rows)
}
