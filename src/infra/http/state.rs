use std::sync::Arc;

use crate::application::hooks::StockHooks;
use crate::application::lookup::StockLookup;
use crate::application::repos::HealthCheck;
use crate::application::stock_sync::StockSync;

use super::auth::AdminToken;

#[derive(Clone)]
pub struct HttpState {
    pub hooks: Arc<StockHooks>,
    pub sync: Arc<StockSync>,
    pub lookup: StockLookup,
    pub health: Arc<dyn HealthCheck>,
    /// Admin routes are only mounted when a token is configured.
    pub admin_token: Option<Arc<AdminToken>>,
}
