use std::sync::Arc;

use beam_core::BeamEngine;

use crate::multipart::MultipartConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct BeamAxumState {
    pub engine: Arc<BeamEngine>,
    pub multipart: Arc<MultipartConfig>,
}

impl BeamAxumState {
    pub fn new(engine: BeamEngine, multipart: MultipartConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            multipart: Arc::new(multipart),
        }
    }
}
