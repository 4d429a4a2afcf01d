//! Properties that hold for every schema pair, checked on the shop fixtures
//! in both dialects

mod common;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::tempdir;

use dbvc::db::split_statements;
use dbvc::schema::diff::{simulate, Change, SchemaDiff};
use dbvc::schema::{
    create_change_sql, export_sql, fingerprint_schema, load_from_file, save_to_file, Dialect, Schema,
};

#[rstest]
#[case::current(common::shop())]
#[case::outdated(common::shop_outdated())]
#[case::empty(Schema::new("shop"))]
fn diff_against_itself_is_empty(
    #[case] schema: Schema,
    #[values(Dialect::MySql, Dialect::Sqlite)] dialect: Dialect,
) {
    assert_eq!(create_change_sql(&schema, &schema.clone(), dialect).unwrap(), "");
    assert!(SchemaDiff::generate(&schema, &schema, dialect).unwrap().is_empty());
    assert_eq!(
        fingerprint_schema(&schema).unwrap(),
        fingerprint_schema(&schema.clone()).unwrap()
    );
}

#[rstest]
#[case::current(common::shop())]
#[case::outdated(common::shop_outdated())]
fn file_round_trip_preserves_schema(#[case] schema: Schema) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shop.schema.json");

    save_to_file(&schema, &path).unwrap();
    let loaded = load_from_file(&path).unwrap();

    assert_eq!(loaded, schema);
    assert_eq!(fingerprint_schema(&loaded).unwrap(), fingerprint_schema(&schema).unwrap());
}

#[rstest]
#[case(common::shop(), common::shop_outdated())]
#[case(common::shop_outdated(), common::shop())]
#[case(common::shop(), Schema::new("shop"))]
#[case(Schema::new("shop"), common::shop())]
fn applying_the_diff_converges(
    #[case] authoritative: Schema,
    #[case] target: Schema,
    #[values(Dialect::MySql, Dialect::Sqlite)] dialect: Dialect,
) {
    let diff = SchemaDiff::generate(&authoritative, &target, dialect).unwrap();
    let migrated = simulate(&diff, &target).unwrap();

    let remaining = SchemaDiff::generate(&authoritative, &migrated, dialect).unwrap();
    assert!(remaining.is_empty(), "left over: {:?}", remaining.changes);
}

#[rstest]
fn scripts_are_deterministic(#[values(Dialect::MySql, Dialect::Sqlite)] dialect: Dialect) {
    let first = create_change_sql(&common::shop(), &common::shop_outdated(), dialect).unwrap();
    for _ in 0..5 {
        let again = create_change_sql(&common::shop(), &common::shop_outdated(), dialect).unwrap();
        assert_eq!(again, first);
    }
    assert!(!first.is_empty());
}

fn position(changes: &[Change], predicate: impl Fn(&Change) -> bool) -> Option<usize> {
    changes.iter().position(predicate)
}

#[rstest]
fn changes_are_ordered(#[values(Dialect::MySql, Dialect::Sqlite)] dialect: Dialect) {
    let diff = SchemaDiff::generate(&common::shop(), &common::shop_outdated(), dialect).unwrap();
    let changes = &diff.changes;

    // Every column of a new table travels inside its CreateTable
    let created = position(changes, |c| matches!(c, Change::CreateTable(t) if t.name == "Orders"));
    assert!(created.is_some());
    assert!(!changes
        .iter()
        .any(|c| matches!(c, Change::AddColumn { table, .. } if table == "Orders")));

    let drop_index = position(changes, |c| {
        matches!(c, Change::DropIndex { table, column, .. } if table == "Users" && column == "Legacy")
    });
    let drop_column = position(changes, |c| {
        matches!(c, Change::DropColumn { table, column } if table == "Users" && column == "Legacy")
    });
    assert!(drop_index.unwrap() < drop_column.unwrap());

    let replace_rows = position(changes, |c| matches!(c, Change::ReplaceRows { .. }));
    let drop_table = position(changes, |c| matches!(c, Change::DropTable(_)));
    assert!(created.unwrap() < replace_rows.unwrap());
    assert!(replace_rows.unwrap() < drop_table.unwrap());
}

#[test]
fn rich_script_orders_statements() {
    let script = create_change_sql(&common::shop(), &common::shop_outdated(), Dialect::MySql).unwrap();
    let at = |needle: &str| {
        script
            .find(needle)
            .unwrap_or_else(|| panic!("`{}` missing from:\n{}", needle, script))
    };

    assert!(at("CREATE TABLE `Orders`") < at("DROP TABLE `Archive`"));
    assert!(at("DROP INDEX `i_Users_Legacy`") < at("DROP COLUMN `Legacy`"));
    assert!(at("DROP INDEX `i_Users_Email`") < at("ADD UNIQUE INDEX `ui_Users_Email`"));
    assert!(at("ALTER TABLE `Users` ADD COLUMN `Name`") < at("ADD INDEX `i_Users_Name`"));
    assert!(at("MODIFY COLUMN `Balance` decimal(10,2) NOT NULL DEFAULT 0.00") > 0);
    assert!(at("DELETE FROM `Status`") < at("INSERT INTO `Status` ( `StatusID`, `Label` ) VALUES ( 2, 'closed' )"));
    assert!(script.ends_with(";\n"));
}

#[rstest]
fn backslash_literals_keep_statements_apart(#[values(Dialect::MySql, Dialect::Sqlite)] dialect: Dialect) {
    let script = export_sql(&common::paths(), dialect).unwrap();
    let statements = split_statements(&script, dialect);

    assert_eq!(statements.len(), 5, "{:#?}", statements);
    assert!(statements[0].starts_with("CREATE TABLE"));
    assert!(statements[1].starts_with("DELETE FROM"));
    for (statement, id) in statements[2..].iter().zip(1..) {
        assert!(statement.starts_with("INSERT INTO"), "{}", statement);
        assert!(statement.contains(&format!("( {},", id)), "{}", statement);
    }
}
