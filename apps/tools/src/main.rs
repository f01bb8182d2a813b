use anyhow::{ensure, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use storage::{NewProduct, Storage};
use tracing::info;

const SEED_NOUNS: &[&str] = &[
    "lamp", "desk", "chair", "kettle", "mug", "shoe", "backpack", "notebook", "speaker", "blanket",
];
const SEED_ADJECTIVES: &[&str] = &["amber", "brisk", "cedar", "dusky", "ember", "frost"];

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/catalog.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    AddProduct {
        name: String,
        price: Decimal,
        #[arg(long, default_value = "")]
        image_url: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Seed {
        #[arg(long, default_value_t = 25)]
        count: u32,
    },
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::AddProduct {
            name,
            price,
            image_url,
            description,
        } => {
            ensure!(!price.is_sign_negative(), "price must not be negative");
            let product_id = storage
                .insert_product(&NewProduct {
                    name,
                    price,
                    image_url,
                    description,
                    created_at: Utc::now(),
                })
                .await?;
            println!("created product_id={product_id}");
        }
        Command::Seed { count } => {
            let now = Utc::now();
            for index in 0..count {
                let noun = SEED_NOUNS[index as usize % SEED_NOUNS.len()];
                let adjective = SEED_ADJECTIVES[index as usize % SEED_ADJECTIVES.len()];
                let name = format!("{adjective} {noun} {index:03}");
                storage
                    .insert_product(&NewProduct {
                        image_url: format!("https://picsum.photos/seed/{index}/200"),
                        description: format!("A {adjective} {noun}."),
                        price: Decimal::new(499 + i64::from(index) * 125, 2),
                        created_at: now - Duration::minutes(i64::from(count - index)),
                        name,
                    })
                    .await?;
            }
            info!(count, database_url = %cli.database_url, "seeded catalog");
            println!("seeded {count} products");
        }
        Command::Count => {
            println!("{} products", storage.count_products().await?);
        }
    }

    Ok(())
}
