pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod search;
pub mod server;
pub mod shell;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::auth;
    pub use crate::config;
    pub use crate::db;
    pub use crate::error::{SdkError, SdkResult};
    pub use crate::models;
    pub use crate::render;
    pub use crate::search;
    pub use crate::server;
    pub use crate::shell;
    pub use crate::telemetry;
}
