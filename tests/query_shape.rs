//! End-to-end assertions on the emitted SQL and the materialised results,
//! driven through the full connector over a recording mock driver.

mod common;

use std::sync::Arc;

use common::{company_schemas, connector, organization_schemas, MockDatabase};
use tabula::datasource::{
    Connector, Filter, FilterGroup, FilterMode, Order, OrderDirection, SourceError, TableQuery,
    Value,
};
use tabula::sql::ColumnInfo;
use tabula::sql::QueryOutput;
use tabula::TableSchemaColumn;

fn selected(schemas: &tabula::SchemaMapper, paths: &[&str]) -> Vec<TableSchemaColumn> {
    let resolved = schemas.resolved_schema("companies").unwrap();

    paths
        .iter()
        .map(|path| resolved.column(path).unwrap().clone())
        .collect()
}

#[tokio::test]
async fn plain_select_emits_joins_counts_and_pk_tiebreak() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    db.push_data(QueryOutput {
        columns: vec![
            ColumnInfo::new("company_companyKey", "BIGINT"),
            ColumnInfo::new("company_name", "VARCHAR"),
        ],
        rows: vec![
            vec![Some(b"42".to_vec()), Some(b"ACME".to_vec())],
            vec![Some(b"43".to_vec()), None],
        ],
    });

    let mut query = TableQuery::new(
        selected(&schemas, &["company_companyKey", "company_name"]),
        "de",
    );
    query.limit = 10;
    query.offset = 5;

    source.validate_request(&query, &schema).unwrap();
    let fetched = source.fetch_data(&query, &schema).await.unwrap();

    assert_eq!(
        db.recorded_data_sql(),
        vec![
            "SELECT company.company_key AS company_companyKey,company.name AS company_name \
             FROM company ORDER BY company.uuid ASC LIMIT ? OFFSET ?"
        ]
    );
    assert_eq!(
        db.recorded_params(),
        vec![vec![Value::UInt(10), Value::UInt(5)]]
    );
    assert_eq!(
        db.recorded_count_sql(),
        vec!["SELECT count(company.uuid) FROM company"]
    );

    assert_eq!(fetched.total_count, 120);
    assert_eq!(fetched.filtered_count, 120);
    assert_eq!(fetched.rows.len(), 2);
    assert_eq!(fetched.rows[0]["company_companyKey"], Value::Int(42));
    assert_eq!(
        fetched.rows[0]["company_name"],
        Value::Str("ACME".to_string())
    );
    assert_eq!(fetched.rows[1]["company_name"], Value::Null);
}

#[tokio::test]
async fn equality_filters_collapse_into_in_and_count_twice() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let mut query = TableQuery::new(selected(&schemas, &["company_companyKey"]), "de");
    query.filters = vec![FilterGroup::new(
        "company_companyKey",
        vec![
            Filter::new(FilterMode::Equals, 1i64),
            Filter::new(FilterMode::Equals, 2i64),
            Filter::new(FilterMode::Equals, 3i64),
        ],
    )];

    let fetched = source.fetch_data(&query, &schema).await.unwrap();

    assert_eq!(
        db.recorded_data_sql(),
        vec![
            "SELECT company.company_key AS company_companyKey FROM company \
             WHERE company.company_key IN (1,2,3) ORDER BY company.uuid ASC"
        ]
    );

    let mut counts = db.recorded_count_sql();
    counts.sort();
    assert_eq!(
        counts,
        vec![
            "SELECT count(company.uuid) FROM company".to_string(),
            "SELECT count(company.uuid) FROM company WHERE company.company_key IN (1,2,3)"
                .to_string(),
        ]
    );

    assert_eq!(fetched.total_count, 120);
    assert_eq!(fetched.filtered_count, 12);
}

#[tokio::test]
async fn wildcard_strings_filter_with_like() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let mut query = TableQuery::new(selected(&schemas, &["company_name"]), "de");
    query.filters = vec![FilterGroup::new(
        "company_name",
        vec![Filter::new(FilterMode::Equals, ".*acme.*")],
    )];

    source.fetch_data(&query, &schema).await.unwrap();

    assert_eq!(
        db.recorded_data_sql(),
        vec![
            "SELECT company.name AS company_name FROM company \
             WHERE company.name LIKE '%acme%' ORDER BY company.uuid ASC"
        ]
    );
}

#[tokio::test]
async fn count_columns_join_an_aggregate_sub_query() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let query = TableQuery::new(selected(&schemas, &["company_user"]), "de");
    source.fetch_data(&query, &schema).await.unwrap();

    assert_eq!(
        db.recorded_data_sql(),
        vec![
            "SELECT company_user.count_result AS company_user FROM company \
             LEFT JOIN (SELECT company_uuid, COUNT(uuid) AS count_result FROM user \
             GROUP BY company_uuid) AS company_user \
             ON company_user.company_uuid = company.uuid ORDER BY company.uuid ASC"
        ]
    );
}

#[tokio::test]
async fn explicit_primary_key_order_is_not_duplicated() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let mut query = TableQuery::new(selected(&schemas, &["company_name"]), "de");
    query.orders = vec![Order::new("company_uuid", OrderDirection::Desc)];

    source.fetch_data(&query, &schema).await.unwrap();

    assert_eq!(
        db.recorded_data_sql(),
        vec![
            "SELECT company.name AS company_name FROM company \
             ORDER BY company.uuid DESC"
        ]
    );
}

#[tokio::test]
async fn unplannable_filter_joins_fail_before_any_count_spawns() {
    let db = Arc::new(MockDatabase::new());
    let schemas = organization_schemas();
    let schema = schemas.resolved_schema("organizations").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let resolved = schema.column("organization_name").unwrap().clone();
    let mut query = TableQuery::new(vec![resolved], "de");
    query.filters = vec![FilterGroup::new(
        "organization_boss_name",
        vec![Filter::new(FilterMode::Equals, "x")],
    )];

    // The filter path is a known column, so validation passes; only join
    // planning can reject it.
    source.validate_request(&query, &schema).unwrap();

    let err = source.fetch_data(&query, &schema).await.unwrap_err();
    assert!(matches!(err, SourceError::Plan(_)));

    // The filtered-count plan failed before either count task was spawned,
    // so nothing reached the driver.
    assert!(db.recorded_count_sql().is_empty());
    assert!(db.recorded_data_sql().is_empty());
}

#[tokio::test]
async fn failing_count_queries_surface_as_errors() {
    let mut db = MockDatabase::new();
    db.fail_counts = true;
    let db = Arc::new(db);

    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let mut query = TableQuery::new(selected(&schemas, &["company_name"]), "de");
    query.filters = vec![FilterGroup::new(
        "company_name",
        vec![Filter::new(FilterMode::Equals, "acme")],
    )];

    // Both count tasks fail; the total error surfaces and the filtered
    // sibling is aborted rather than left outstanding.
    let err = source.fetch_data(&query, &schema).await.unwrap_err();
    assert!(matches!(err, SourceError::Database(_)));

    assert_eq!(db.recorded_data_sql().len(), 1);
}

#[tokio::test]
async fn requests_without_limit_are_not_wrapped() {
    let db = Arc::new(MockDatabase::new());
    let schemas = company_schemas();
    let schema = schemas.resolved_schema("companies").unwrap().clone();
    let source = connector(&db, schemas.clone());

    let query = TableQuery::new(selected(&schemas, &["company_name"]), "de");
    source.fetch_data(&query, &schema).await.unwrap();

    let sql = db.recorded_data_sql();
    assert!(sql[0].starts_with("SELECT company.name"));
    assert!(!sql[0].contains("LIMIT"));
    assert!(db.recorded_params()[0].is_empty());
}
