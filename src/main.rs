use redis_objects::{telemetry, MemoryServer, MemoryStore, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = StoreConfig::from_env()?;
    telemetry::init_from_config(&config)?;

    let addr = std::env::args().nth(1).unwrap_or(config.addr);
    let server = MemoryServer::bind(&addr, MemoryStore::new()).await?;
    println!("Memory store listening on {}", server.local_addr()?);

    server.run().await;
    Ok(())
}
