use std::sync::Arc;

use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::runner::{EventBus, JobRunner};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub runner: Arc<JobRunner>,
    pub bus: EventBus,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseBackend>,
        runner: Arc<JobRunner>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            db,
            runner,
            bus,
        }
    }
}
