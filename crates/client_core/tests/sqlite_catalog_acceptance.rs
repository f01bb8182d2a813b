use std::sync::Arc;

use chrono::{TimeZone, Utc};
use client_core::{ControllerOptions, FetchController, FetchState};
use rust_decimal::Decimal;
use storage::{NewProduct, Storage};

async fn seeded_storage(names: &[&str]) -> Storage {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (index, name) in names.iter().enumerate() {
        storage
            .insert_product(&NewProduct {
                name: (*name).to_string(),
                price: Decimal::new(250 + index as i64, 2),
                image_url: format!("https://cdn.example/{index}.png"),
                description: String::new(),
                created_at: Utc
                    .timestamp_opt(1_700_000_000 + index as i64, 0)
                    .single()
                    .expect("timestamp"),
            })
            .await
            .expect("insert");
    }
    storage
}

fn names(state: &FetchState) -> Vec<&str> {
    state.items().iter().map(|p| p.name.as_str()).collect()
}

async fn settle(handle: Option<tokio::task::JoinHandle<()>>) {
    handle.expect("accepted").await.expect("task");
}

#[tokio::test]
async fn browses_and_searches_a_sqlite_catalog() {
    let catalog: Vec<String> = (1..=12).map(|i| format!("item {i:02}")).collect();
    let catalog: Vec<&str> = catalog.iter().map(String::as_str).collect();
    let storage = seeded_storage(&catalog).await;

    let controller = FetchController::with_options(
        Arc::new(storage),
        ControllerOptions {
            initial_load: false,
            ..ControllerOptions::default()
        },
    );

    settle(controller.load_more()).await;
    let first = controller.state();
    assert_eq!(first.items().len(), 10);
    assert_eq!(names(&first)[0], "item 12");
    assert_eq!(names(&first)[9], "item 03");

    settle(controller.load_more()).await;
    let second = controller.state();
    assert_eq!(second.items().len(), 12);
    assert_eq!(&names(&second)[10..], ["item 02", "item 01"]);

    settle(controller.load_more()).await;
    assert_eq!(controller.state(), second);

    settle(controller.search("item 1")).await;
    assert_eq!(
        names(&controller.state()),
        vec!["item 10", "item 11", "item 12"]
    );
}

#[tokio::test]
async fn prefix_search_respects_range_bounds() {
    let storage = seeded_storage(&["aa", "ab", "abc", "abz", "b"]).await;
    let controller = FetchController::with_options(
        Arc::new(storage),
        ControllerOptions {
            initial_load: false,
            ..ControllerOptions::default()
        },
    );

    settle(controller.search("ab")).await;
    assert_eq!(names(&controller.state()), vec!["ab", "abc", "abz"]);
}

#[tokio::test]
async fn initial_load_runs_on_creation() {
    let storage = seeded_storage(&["desk", "lamp"]).await;
    let controller = FetchController::new(Arc::new(storage));

    let loaded = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            let state = controller.state();
            if state.is_loaded() {
                return state;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("initial load timeout");

    assert_eq!(names(&loaded), vec!["lamp", "desk"]);
}

#[tokio::test]
async fn long_prices_reach_the_ui_without_rounding() {
    let price: Decimal = "12345678901234567.89".parse().expect("decimal");
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert_product(&NewProduct {
            name: "chandelier".to_string(),
            price,
            image_url: String::new(),
            description: String::new(),
            created_at: Utc::now(),
        })
        .await
        .expect("insert");
    let controller = FetchController::with_options(
        Arc::new(storage),
        ControllerOptions {
            initial_load: false,
            ..ControllerOptions::default()
        },
    );

    settle(controller.load_more()).await;
    assert_eq!(controller.state().items()[0].price, price);
}
