use scent_data_core::app::database_service::{DatabaseService, MANAGED_TABLES};
use scent_data_core::app::SessionService;
use scent_data_core::crypto::PasswordCipher;
use scent_data_core::infra::config::{self, CryptoConfig, SessionConfig};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--apply-schema]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL, CRYPTO_KEY (64 hex chars), CRYPTO_SALT,\n\
           SESSION_SECRET (32+ bytes)\n\
         Optional:\n\
           DATABASE_MAX_CONNECTIONS, PASSWORD_HASH_ROUNDS, SESSION_TTL_MINUTES,\n\
           FORGOT_PASSWORD_CODE_DURATION_MINUTES, BIND_ADDR\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let apply_schema = args.iter().any(|a| a == "--apply-schema");

    // Force-read config (nice error messages if missing)
    let database_url = config::database_url()?;
    let crypto = CryptoConfig::from_env()?;
    PasswordCipher::new(&crypto)
        .map_err(|e| anyhow::anyhow!("CRYPTO_KEY rejected: {}", e))?;
    let session = SessionConfig::from_env()?;
    SessionService::new(&session)
        .map_err(|e| anyhow::anyhow!("SESSION_SECRET rejected: {}", e))?;

    println!("> Preflight:");
    println!("  DATABASE_MAX_CONNECTIONS={}", config::database_max_connections());
    println!("  PASSWORD_HASH_ROUNDS={}", crypto.hash_rounds);
    println!(
        "  FORGOT_PASSWORD_CODE_DURATION_MINUTES={}",
        config::forgot_password_code_duration_minutes()
    );
    println!("  SESSION_TTL_MINUTES={}", session.ttl_minutes);
    println!("  BIND_ADDR={}", config::bind_addr());
    println!("  CRYPTO_KEY decodes to a 32-byte key (ok).");

    let db = DatabaseService::connect(&database_url, 1).await?;
    db.ping()
        .await
        .map_err(|e| anyhow::anyhow!("Database not reachable: {}", e))?;
    println!("  Database reachable.");

    if apply_schema {
        println!("  Applying schema...");
        db.ensure_schema().await?;
    }

    let existing = db.existing_tables().await?;
    let mut missing = Vec::new();
    for (table, _) in MANAGED_TABLES {
        if existing.iter().any(|t| t == table) {
            println!("  table {:<18} present", table);
        } else {
            println!("  table {:<18} MISSING", table);
            missing.push(table);
        }
    }

    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "Missing tables: {}. Re-run with --apply-schema",
            missing.join(", ")
        ));
    }

    println!("> Preflight OK.");
    Ok(())
}
