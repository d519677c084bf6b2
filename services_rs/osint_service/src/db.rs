use sqlx::postgres::{PgPool, PgPoolOptions};

fn table_name(schema: &Option<String>, name: &str) -> String {
    match schema {
        Some(s) => format!("{s}.{name}"),
        None => name.to_string(),
    }
}

pub async fn connect(db_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(db_url)
        .await
}

pub async fn ensure_schema(pool: &PgPool, db_schema: &Option<String>) -> Result<(), sqlx::Error> {
    if let Some(schema) = db_schema {
        let ddl = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
        let _ = sqlx::query(&ddl).execute(pool).await;
    }

    let accounts = table_name(db_schema, "accounts");
    let scan_logs = table_name(db_schema, "scan_logs");
    let transactions = table_name(db_schema, "transactions");

    let ddls = [
        format!(
            "CREATE TABLE IF NOT EXISTS {accounts} (\
             id VARCHAR(36) PRIMARY KEY,\
             email VARCHAR(255) NOT NULL UNIQUE,\
             display_name VARCHAR(120),\
             avatar_url VARCHAR(255),\
             api_key_hash VARCHAR(64) NOT NULL UNIQUE,\
             token_balance BIGINT NOT NULL DEFAULT 0,\
             created_at TEXT NOT NULL,\
             updated_at TEXT NOT NULL\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {scan_logs} (\
             id VARCHAR(36) PRIMARY KEY,\
             account_id VARCHAR(36) NOT NULL,\
             module VARCHAR(16) NOT NULL,\
             query VARCHAR(255) NOT NULL,\
             tokens_charged BIGINT NOT NULL,\
             created_at TEXT NOT NULL\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {transactions} (\
             id VARCHAR(36) PRIMARY KEY,\
             account_id VARCHAR(36) NOT NULL,\
             amount BIGINT NOT NULL,\
             tokens BIGINT NOT NULL,\
             status VARCHAR(16) NOT NULL,\
             external_payment_id VARCHAR(64),\
             created_at TEXT NOT NULL,\
             updated_at TEXT\
             )"
        ),
        format!("CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_email ON {accounts}(email)"),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_api_key_hash ON {accounts}(api_key_hash)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_scan_logs_account ON {scan_logs}(account_id)"),
        format!("CREATE INDEX IF NOT EXISTS idx_scan_logs_created ON {scan_logs}(created_at)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_transactions_account ON {transactions}(account_id)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_transactions_status ON {transactions}(status)"),
    ];

    for ddl in ddls {
        let _ = sqlx::query(&ddl).execute(pool).await;
    }

    Ok(())
}
