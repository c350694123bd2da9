use std::path::PathBuf;
use std::sync::Arc;

use courier_db::Database;
use courier_gateway::registry::GroupRegistry;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub registry: GroupRegistry,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}
