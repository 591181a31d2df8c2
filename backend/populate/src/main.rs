use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Seed a Rango database with starter categories")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://rango.db")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let pool = directory::store::connect(&args.database_url).await?;
    println!("Starting Rango population script...\n");

    let summary = populate::populate(&pool, &populate::SEED).await?;

    println!("\nNew Categories: {}", summary.new_categories);
    println!("New Pages: {}", summary.new_pages);
    println!("Skipped Categories: {}", summary.skipped_categories);

    Ok(())
}
