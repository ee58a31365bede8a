use std::path::PathBuf;

use crate::auth::IAM_TOKEN_URL;

/** \brief 默认凭据库文件名。 */
pub const DEFAULT_DB_PATH: &str = "api_data.db";

/** \brief 首次启动时预填的部署地址模板（需替换部署 ID）。 */
pub const DEFAULT_ENDPOINT_URL: &str =
    "https://us-south.ml.cloud.ibm.com/ml/v4/deployments/<deployment-id>/predictions?version=2021-05-01";

/**
 * \brief 运行时配置，全部来自环境变量，命令行参数可再覆盖。
 */
#[derive(Debug, Clone)]
pub struct AppConfig {
    /** \brief SQLite 文件路径 */
    pub db_path: PathBuf,
    /** \brief IAM 换取令牌地址 */
    pub token_url: String,
    /** \brief 遥测日志目录 */
    pub log_dir: PathBuf,
    /** \brief 静态页面目录 */
    pub ui_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            token_url: IAM_TOKEN_URL.to_string(),
            log_dir: PathBuf::from("logs"),
            ui_dir: PathBuf::from("web"),
        }
    }
}

impl AppConfig {
    /**
     * \brief 读取 SEARCHDECK_* 环境变量，缺省值见 Default。
     */
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            db_path: non_empty("SEARCHDECK_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            token_url: non_empty("SEARCHDECK_TOKEN_URL").unwrap_or(defaults.token_url),
            log_dir: non_empty("SEARCHDECK_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            ui_dir: non_empty("SEARCHDECK_UI_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.ui_dir),
        }
    }
}
