use rusqlite::{params, ErrorCode, OptionalExtension};
use std::{path::Path, thread, time::Duration};

pub use rusqlite::Connection;

use crate::error::SdkResult;
use crate::models::CredentialRecord;

/**
 * \brief 打开指定路径的凭据库文件。
 */
pub fn open_db(path: impl AsRef<Path>) -> SdkResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief 运行数据库迁移，创建必要表结构（可重复执行）。
 */
pub fn migrate(conn: &Connection) -> SdkResult<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        CREATE TABLE IF NOT EXISTS credentials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            api_key TEXT,
            deployment_url TEXT
        );

        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
        )
    })
}

/**
 * \brief 追加一条凭据记录，返回新行主键。历史行不做更新或删除。
 */
pub fn save_credentials(conn: &Connection, api_key: &str, endpoint_url: &str) -> SdkResult<i64> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO credentials (api_key, deployment_url) VALUES (?1, ?2)",
            params![api_key, endpoint_url],
        )
    })?;
    Ok(conn.last_insert_rowid())
}

/**
 * \brief 读取最近一次保存的凭据（按主键倒序取一行）。
 */
pub fn get_latest_credentials(conn: &Connection) -> SdkResult<Option<CredentialRecord>> {
    conn.query_row(
        "SELECT id, api_key, deployment_url FROM credentials ORDER BY id DESC LIMIT 1",
        [],
        |row| {
            Ok(CredentialRecord {
                id: row.get(0)?,
                api_key: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                endpoint_url: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

fn set_bool_config(conn: &Connection, key: &str, value: bool) -> SdkResult<()> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, if value { "1" } else { "0" }],
        )
    })?;
    Ok(())
}

fn get_bool_config(conn: &Connection, key: &str, default: bool) -> SdkResult<bool> {
    let val = conn
        .query_row(
            "SELECT value FROM app_config WHERE key=?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(val.map(|s| s == "1").unwrap_or(default))
}

/**
 * \brief 读取遥测开关。
 */
pub fn get_telemetry_enabled(conn: &Connection) -> SdkResult<bool> {
    get_bool_config(conn, "telemetry_enabled", false)
}

/**
 * \brief 更新遥测开关。
 */
pub fn set_telemetry_enabled(conn: &Connection, enabled: bool) -> SdkResult<()> {
    set_bool_config(conn, "telemetry_enabled", enabled)
}

/**
 * \brief 针对 SQLite 锁冲突的重试助手。
 * \details 捕获 `database is locked`/`database table is locked` 并线性退避，最多 6 次。
 */
fn retry_on_locked<T, F>(mut action: F) -> SdkResult<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    let mut attempt = 0;
    loop {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                attempt += 1;
                thread::sleep(Duration::from_millis(200 * attempt as u64));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
