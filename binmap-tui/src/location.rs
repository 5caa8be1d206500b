use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use binmap_core::{
    model::Position,
    ports::{LocationFailure, LocationPort, PortError},
};
use tracing::{debug, warn};

/// Location source for terminals: a GPS fix file written by a receiver daemon,
/// with an optional fixed position to fall back on.
///
/// The file is read on every acquisition so a retry picks up a fix that
/// arrived after the previous attempt.
pub(crate) struct FixLocationPort {
    fix_file: Option<PathBuf>,
    fallback: Option<Position>,
}

impl FixLocationPort {
    pub(crate) fn new(fix_file: Option<PathBuf>, fallback: Option<Position>) -> Self {
        Self { fix_file, fallback }
    }
}

#[async_trait]
impl LocationPort for FixLocationPort {
    async fn acquire(&self) -> Result<Position, PortError> {
        let Some(path) = &self.fix_file else {
            return self
                .fallback
                .ok_or(PortError::LocationUnavailable(LocationFailure::NoHardware));
        };

        match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents.parse::<Position>().map_err(|err| {
                warn!(path = %path.display(), error = %err, "GPS fix file holds no usable position");
                PortError::LocationUnavailable(LocationFailure::Timeout)
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no GPS fix yet");
                self.fallback
                    .ok_or(PortError::LocationUnavailable(LocationFailure::Timeout))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read GPS fix file");
                Err(PortError::LocationUnavailable(
                    LocationFailure::PermissionDenied,
                ))
            }
        }
    }
}
