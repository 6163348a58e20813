//! Issuance entry point
//!
//! [`Issuer`] wires the encoder to its side effects. For a valid name it:
//! 1. Draws an id that is not already embedded in a registered payload
//! 2. Renders the payload as a scannable artifact
//! 3. Appends a row to the audit trail
//! 4. Adds the payload to the registry
//!
//! The registry add is the commit point: a payload only becomes
//! authorized once its artifact and audit row exist. A failure at any step
//! stops the issuance, and a rendered artifact is removed again if a later
//! step fails.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use rand_core::RngCore;

use crate::artifact::{artifact_file_name, artifact_path, ArtifactRenderer};
use crate::audit::{AuditLog, IssuanceRecord};
use crate::clock::Clock;
use crate::encoder::{validate_display_name, IdentityEncoder, IssuedIdentity};
use crate::error::{Error, Result};
use crate::registry::RegistryStore;

pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 8;

/// Everything handed back to the holder after issuance.
#[derive(Debug, Clone)]
pub struct Issued {
    pub identity: IssuedIdentity,
    /// Human-readable confirmation to display alongside the artifact.
    pub confirmation: String,
    pub artifact_path: PathBuf,
}

pub struct Issuer<R, S, A, L, C> {
    encoder: IdentityEncoder<R>,
    registry: S,
    renderer: A,
    audit: L,
    clock: C,
    artifact_dir: PathBuf,
    max_id_attempts: u32,
}

impl<R, S, A, L, C> Issuer<R, S, A, L, C>
where
    R: RngCore,
    S: RegistryStore,
    A: ArtifactRenderer,
    L: AuditLog,
    C: Clock,
{
    pub fn new(
        encoder: IdentityEncoder<R>,
        registry: S,
        renderer: A,
        audit: L,
        clock: C,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            encoder,
            registry,
            renderer,
            audit,
            clock,
            artifact_dir: artifact_dir.into(),
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }

    /// How many ids to draw before giving up on a collision-free one.
    #[must_use]
    pub fn with_max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts.max(1);
        self
    }

    pub fn registry(&self) -> &S {
        &self.registry
    }

    pub fn audit(&self) -> &L {
        &self.audit
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn issue(&mut self, display_name: &str) -> Result<Issued> {
        let name = validate_display_name(display_name)?;
        let known_ids = self.registry.load()?.known_ids();
        let issued_at = self.clock.now();

        let mut attempt = 0;
        let identity = loop {
            attempt += 1;
            let candidate = self.encoder.issue(name, issued_at)?;
            if !known_ids.contains(candidate.token.id()) {
                break candidate;
            }
            warn!("Id {} already issued, drawing another", candidate.token.id());
            if attempt >= self.max_id_attempts {
                return Err(Error::IdCollision { attempts: attempt });
            }
        };

        let token = &identity.token;
        let id = token.id().to_string();
        let file_name = artifact_file_name(token.display_name(), &id, self.renderer.extension());
        let issue_date = token.issued_at().with_timezone(&Local).date_naive();
        let path = artifact_path(&self.artifact_dir, issue_date, &file_name);

        self.renderer.render(identity.payload.as_str(), &path)?;
        let record = IssuanceRecord {
            display_name: token.display_name().to_owned(),
            id: id.clone(),
            artifact_name: file_name,
            issued_at: token.issued_at(),
        };
        let committed = self
            .audit
            .record(&record)
            .and_then(|()| self.registry.add(identity.payload.as_str()));
        if let Err(e) = committed {
            discard_artifact(&path);
            return Err(e);
        }

        info!("Issued {id} -> {}", path.display());
        Ok(Issued {
            confirmation: token.confirmation(),
            identity,
            artifact_path: path,
        })
    }
}

fn discard_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed {} after failed issuance", path.display()),
        Err(e) => warn!("Could not remove {}: {e}", path.display()),
    }
}
