pub mod server;

use crate::config::AppConfig;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: Option<String>,
        config: Box<AppConfig>,
    },
}
