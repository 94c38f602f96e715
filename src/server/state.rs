use std::sync::Arc;

use crate::compose::{ComposeOptions, Compositor};
use crate::settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) options: ComposeOptions,
    pub(crate) compositor: Arc<Compositor>,
}
