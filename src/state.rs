use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::notify::Mailer;
use crate::services::payments::PaymentProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub payments: Box<dyn PaymentProvider>,
    pub mailer: Box<dyn Mailer>,
}
