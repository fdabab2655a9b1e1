use sqlx::sqlite::SqlitePool;
use tracing::info;

pub async fn setup(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            is_active BOOLEAN DEFAULT true
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create products table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            price REAL,
            stock INTEGER DEFAULT 0,
            category TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Seed sample data if tables are empty
    seed_sample_data(pool).await?;

    Ok(())
}

async fn seed_sample_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Check if users table already has data
    let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if user_count.0 > 0 {
        // Data already seeded
        return Ok(());
    }

    let first_names = [
        "Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah",
        "Isaac", "Julia", "Kevin", "Laura", "Michael", "Nancy", "Oscar", "Patricia",
    ];
    let last_names = [
        "Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor", "Anderson",
        "Thomas", "Jackson", "White", "Harris", "Martin", "Thompson", "Garcia",
    ];

    // Three pages at the default page size
    for index in 0..25 {
        let first = first_names[index % first_names.len()];
        let last = last_names[index % last_names.len()];
        let email = format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            index
        );
        let is_active = index % 5 != 0;
        sqlx::query("INSERT INTO users (name, email, is_active) VALUES (?, ?, ?)")
            .bind(format!("{} {}", first, last))
            .bind(email)
            .bind(is_active)
            .execute(pool)
            .await?;
    }

    let categories = ["Electronics", "Furniture", "Stationery", "Clothing", "Sports"];
    let product_types = [
        "Laptop", "Mouse", "Keyboard", "Monitor", "Chair", "Desk", "Notebook", "Pen",
    ];

    for index in 0..40 {
        let product_type = product_types[index % product_types.len()];
        let category = categories[index % categories.len()];
        let price = 5.99 + (index as f64 * 12.5);
        let stock = (index * 7 + 5) % 500;

        sqlx::query("INSERT INTO products (name, price, stock, category) VALUES (?, ?, ?, ?)")
            .bind(format!("{} {}", product_type, index + 1))
            .bind(price)
            .bind(stock as i32)
            .bind(category)
            .execute(pool)
            .await?;
    }

    info!(users = 25, products = 40, "Sample data seeded");
    Ok(())
}
