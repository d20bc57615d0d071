use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use storefront_api::{
    auth::AuthService,
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{
        category,
        offer::{self, OfferType},
        product, product_color, product_image, user,
    },
    services::commerce::product_catalog_service::{
        CreateCategoryInput, CreateProductInput, ProductCatalogService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::SeedDemo => handle_seed_demo(&context, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "storefront", about = "Storefront maintenance commands", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a user account, optionally with dashboard access
    CreateUser(CreateUserArgs),
    /// Insert a demo category with products, images, colors and an offer
    SeedDemo,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long, action = ArgAction::SetTrue, help = "Grant access to the admin dashboard")]
    staff: bool,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn catalog(&self) -> ProductCatalogService {
        ProductCatalogService::new(self.db.clone(), self.config.products_per_page)
    }
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(args.username.as_str()))
        .one(&*context.db)
        .await?;
    if existing.is_some() {
        anyhow::bail!("user '{}' already exists", args.username);
    }

    let password_hash = AuthService::hash_password(&args.password).context("failed to hash password")?;
    let account = user::ActiveModel {
        username: Set(args.username),
        email: Set(args.email),
        password_hash: Set(password_hash),
        is_staff: Set(args.staff),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&*context.db)
    .await
    .context("failed to create user")?;

    if json {
        print_json(&account)?;
    } else {
        println!(
            "Created user {} (id {}){}",
            account.username,
            account.id,
            if account.is_staff { " with staff access" } else { "" }
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SeedSummary {
    category: category::Model,
    products: Vec<product::Model>,
    offer: offer::Model,
}

async fn handle_seed_demo(context: &CliContext, json: bool) -> Result<()> {
    let catalog = context.catalog();

    let category = catalog
        .create_category(CreateCategoryInput {
            name: "Home & Kitchen".into(),
            name_en: Some("Home & Kitchen".into()),
            name_ar: Some("المنزل والمطبخ".into()),
            slug: None,
            image: None,
            is_active: true,
        })
        .await
        .context("failed to create demo category")?;

    let demo = [
        ("Ceramic Mug", "كوب سيراميك", dec!(12.50), 40, true),
        ("Linen Tea Towel", "منشفة شاي من الكتان", dec!(8.00), 25, false),
        ("Cast Iron Skillet", "مقلاة من الحديد الزهر", dec!(45.00), 6, true),
    ];

    let mut products = Vec::with_capacity(demo.len());
    for (name, name_ar, price, stock, featured) in demo {
        let product = catalog
            .create_product(CreateProductInput {
                category_id: category.id,
                name: name.into(),
                name_en: Some(name.into()),
                name_ar: Some(name_ar.into()),
                slug: None,
                description: format!("{name} from the demo catalog."),
                price,
                compare_at_price: None,
                discount_percentage: None,
                stock,
                is_active: true,
                is_featured: featured,
            })
            .await
            .with_context(|| format!("failed to create demo product '{name}'"))?;

        product_image::ActiveModel {
            product_id: Set(product.id),
            image: Set(format!("products/{}.jpg", product.slug)),
            alt_text: Set(name.into()),
            ordering: Set(0),
            ..Default::default()
        }
        .insert(&*context.db)
        .await?;

        product_color::ActiveModel {
            product_id: Set(product.id),
            name: Set("Natural".into()),
            hex_code: Set("#D9C8A9".into()),
            ordering: Set(0),
            ..Default::default()
        }
        .insert(&*context.db)
        .await?;

        products.push(product);
    }

    let now = Utc::now();
    let offer = offer::ActiveModel {
        title: Set("Kitchen week".into()),
        offer_type: Set(OfferType::Percentage),
        value: Set(dec!(15)),
        start_date: Set(now - Duration::days(1)),
        end_date: Set(now + Duration::days(14)),
        is_active: Set(true),
        product_id: Set(None),
        category_id: Set(Some(category.id)),
        ..Default::default()
    }
    .insert(&*context.db)
    .await
    .context("failed to create demo offer")?;

    let summary = SeedSummary {
        category,
        products,
        offer,
    };
    if json {
        print_json(&summary)?;
    } else {
        println!("Seeded category '{}'", summary.category.slug);
        for product in &summary.products {
            println!("- {} • {} • stock {}", product.slug, product.price, product.stock);
        }
        println!("Offer '{}' runs until {}", summary.offer.title, summary.offer.end_date);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
