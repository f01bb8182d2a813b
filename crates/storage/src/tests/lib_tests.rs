use super::*;
use chrono::TimeZone;

fn product(name: &str, created_at_secs: i64) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        price: Decimal::new(1999, 2),
        image_url: format!("https://cdn.example/{name}.png"),
        description: format!("{name} description"),
        created_at: Utc
            .timestamp_opt(created_at_secs, 0)
            .single()
            .expect("timestamp"),
    }
}

fn names(records: &[RawRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            record.fields[FIELD_NAME]
                .as_str()
                .expect("name string")
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("catalog.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn inserts_products_with_generated_ids() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .insert_product(&product("lamp", 10))
        .await
        .expect("first");
    let second = storage
        .insert_product(&product("desk", 20))
        .await
        .expect("second");

    assert_ne!(first, second);
    assert_eq!(storage.count_products().await.expect("count"), 2);
}

#[tokio::test]
async fn paginates_newest_first_with_cursor() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (index, name) in ["p1", "p2", "p3", "p4", "p5"].iter().enumerate() {
        storage
            .insert_product(&product(name, 100 + index as i64))
            .await
            .expect("insert");
    }

    let first = storage
        .list_products_page(FIELD_CREATED_AT, true, 2, None)
        .await
        .expect("first page");
    assert_eq!(names(&first.records), vec!["p5", "p4"]);
    let cursor = first.next_cursor.expect("cursor after first page");
    assert_eq!(cursor.token(), first.records[1].id.as_str());

    let second = storage
        .list_products_page(FIELD_CREATED_AT, true, 2, Some(&cursor))
        .await
        .expect("second page");
    assert_eq!(names(&second.records), vec!["p3", "p2"]);

    let third = storage
        .list_products_page(
            FIELD_CREATED_AT,
            true,
            2,
            second.next_cursor.as_ref(),
        )
        .await
        .expect("third page");
    assert_eq!(names(&third.records), vec!["p1"]);

    let exhausted = storage
        .list_products_page(FIELD_CREATED_AT, true, 2, third.next_cursor.as_ref())
        .await
        .expect("exhausted page");
    assert!(exhausted.records.is_empty());
    assert!(exhausted.next_cursor.is_none());
}

#[tokio::test]
async fn paginates_ascending_by_name() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (index, name) in ["cedar", "alder", "birch"].iter().enumerate() {
        storage
            .insert_product(&product(name, index as i64))
            .await
            .expect("insert");
    }

    let page = storage
        .list_products_page(FIELD_NAME, false, 10, None)
        .await
        .expect("page");
    assert_eq!(names(&page.records), vec!["alder", "birch", "cedar"]);
}

#[tokio::test]
async fn records_carry_every_product_field() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .insert_product(&product("kettle", 1_700_000_000))
        .await
        .expect("insert");

    let page = storage
        .list_products_page(FIELD_CREATED_AT, true, 10, None)
        .await
        .expect("page");
    let record = &page.records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.fields[FIELD_PRICE].as_f64(), Some(19.99));
    assert_eq!(
        record.fields[FIELD_IMAGE_URL].as_str(),
        Some("https://cdn.example/kettle.png")
    );
    assert_eq!(
        record.fields[FIELD_DESCRIPTION].as_str(),
        Some("kettle description")
    );
    assert_eq!(
        record.fields[FIELD_CREATED_AT].as_i64(),
        Some(1_700_000_000_000)
    );
}

#[tokio::test]
async fn null_columns_surface_as_null_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("INSERT INTO products (id, name, created_at_ms) VALUES ('bare', 'bare', 5)")
        .execute(storage.pool())
        .await
        .expect("raw insert");

    let page = storage
        .list_products_page(FIELD_CREATED_AT, true, 10, None)
        .await
        .expect("page");
    assert_eq!(page.records[0].fields[FIELD_PRICE], Value::Null);
    assert_eq!(page.records[0].fields[FIELD_IMAGE_URL], Value::Null);
}

#[tokio::test]
async fn rejects_unknown_cursor_and_unindexed_field() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let err = storage
        .list_products_page(FIELD_CREATED_AT, true, 10, Some(&Cursor::new("missing")))
        .await
        .expect_err("unknown cursor");
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::CursorNotFound("missing".to_string()))
    );
    assert!(err.to_string().contains("no longer exists"), "{err}");

    let err = storage
        .list_products_page(FIELD_PRICE, true, 10, None)
        .await
        .expect_err("unindexed field");
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::UnindexedField(FIELD_PRICE.to_string()))
    );
}

#[tokio::test]
async fn price_keeps_every_stored_digit() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let price = Decimal::from_str("12345678901234567.89").expect("decimal");
    storage
        .insert_product(&NewProduct {
            price,
            ..product("chandelier", 1)
        })
        .await
        .expect("insert");

    let page = storage
        .list_products_page(FIELD_CREATED_AT, true, 10, None)
        .await
        .expect("page");
    assert_eq!(
        page.records[0].fields[FIELD_PRICE].to_string(),
        "12345678901234567.89"
    );
    let mapped = shared::domain::Product::try_from(&page.records[0]).expect("product");
    assert_eq!(mapped.price, price);
}

#[tokio::test]
async fn range_query_implements_starts_with() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (index, name) in ["aa", "ab", "abc", "abz", "b"].iter().enumerate() {
        storage
            .insert_product(&product(name, index as i64))
            .await
            .expect("insert");
    }

    let upper = format!("ab{}", char::MAX);
    let records = storage
        .list_products_in_range(FIELD_NAME, "ab", &upper)
        .await
        .expect("range");
    assert_eq!(names(&records), vec!["ab", "abc", "abz"]);
}
