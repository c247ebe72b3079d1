use crate::{EngineError, EngineState, MediaEngine};
use std::path::Path;

/// Accepts every call and never reports progress. Stands in when no real
/// engine could be started.
#[derive(Debug, Default)]
pub struct NoopEngine;

impl MediaEngine for NoopEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn load(&mut self, _path: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_time(&mut self, _ms: u64) -> Result<(), EngineError> {
        Ok(())
    }

    fn time(&mut self) -> Result<u64, EngineError> {
        Ok(0)
    }

    fn duration(&mut self) -> Result<u64, EngineError> {
        Ok(0)
    }

    fn set_volume(&mut self, _volume: u8) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_rate(&mut self, _rate: f64) -> Result<(), EngineError> {
        Ok(())
    }

    fn state(&mut self) -> EngineState {
        EngineState::Idle
    }
}
