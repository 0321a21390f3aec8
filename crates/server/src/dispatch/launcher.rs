// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boundary to the agent-runner side.
//!
//! Specialists are separate processes; the core only records the spawn and
//! waits for the runner to register over HTTP. The trait exists so tests
//! (and embedders) can observe or stub the launch.

use async_trait::async_trait;
use ft_core::sortie::Sortie;
use ft_core::specialist::Specialist;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("spawn failed: {0}")]
    Spawn(String),
}

/// Launches one specialist process per eligible sortie.
#[async_trait]
pub trait SpecialistLauncher: Send + Sync {
    async fn launch(&self, specialist: &Specialist, sortie: &Sortie) -> Result<(), LaunchError>;
}

/// Default launcher: records the request and leaves process management to
/// the external runner infrastructure.
pub struct LogLauncher;

#[async_trait]
impl SpecialistLauncher for LogLauncher {
    async fn launch(&self, specialist: &Specialist, sortie: &Sortie) -> Result<(), LaunchError> {
        tracing::info!(
            specialist = %specialist.id,
            sortie = %sortie.id,
            title = %sortie.title,
            "specialist launch requested"
        );
        Ok(())
    }
}
