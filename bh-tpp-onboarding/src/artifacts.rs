// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Persistence of the files produced by an onboarding run.

use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};

use bherror::traits::{ErrorContext as _, ForeignError as _};

use crate::{Error, Result};

/// File produced by an onboarding run, with a fixed location relative to the
/// [`ArtifactStore`] root.
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Artifact {
    /// QWAC certificate, PEM.
    #[strum(to_string = "transport certificate")]
    TransportCertificate,
    /// QWAC private key, PKCS#8 PEM.
    #[strum(to_string = "transport key")]
    TransportKey,
    /// QSEAL certificate, PEM.
    #[strum(to_string = "signing certificate")]
    SigningCertificate,
    /// QSEAL private key, PKCS#8 PEM.
    #[strum(to_string = "signing key")]
    SigningKey,
    /// Public JWKS document.
    #[strum(to_string = "public JWKS")]
    PublicJwks,
    /// Compact serialized SSA.
    #[strum(to_string = "software statement")]
    SoftwareStatement,
    /// Compact serialized registration JWT.
    #[strum(to_string = "registration JWT")]
    RegistrationJwt,
    /// Raw registration response, including the client secret.
    #[strum(to_string = "registration result")]
    RegistrationResult,
}

impl Artifact {
    /// Location of the artifact relative to the store root.
    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::TransportCertificate => "certs/qwac_cert.pem",
            Self::TransportKey => "certs/qwac_key.pem",
            Self::SigningCertificate => "certs/qseal_cert.pem",
            Self::SigningKey => "certs/qseal_key.pem",
            Self::PublicJwks => "certs/public_jwks.json",
            Self::SoftwareStatement => "conf/ssa.jwt",
            Self::RegistrationJwt => "conf/registration_jwt.txt",
            Self::RegistrationResult => "certs/tpp_info.json",
        }
    }

    /// Whether the artifact holds secret material and must be readable by
    /// the owner only.
    pub const fn is_secret(self) -> bool {
        matches!(
            self,
            Self::TransportKey | Self::SigningKey | Self::RegistrationResult
        )
    }
}

/// Directory-backed storage of [`Artifact`]s.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. Nothing is created until the first
    /// write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute (or root-relative) path of the artifact.
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    /// Returns whether the artifact has been written.
    pub fn exists(&self, artifact: Artifact) -> bool {
        self.path(artifact).is_file()
    }

    /// Write the artifact, replacing any previous content.
    ///
    /// The contents are flushed and synced to disk before returning; the file
    /// is closed on every path. Secret artifacts get mode `0600` on Unix.
    pub fn write(&self, artifact: Artifact, contents: &[u8]) -> Result<PathBuf, Error> {
        let path = self.path(artifact);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .foreign_err(|| Error::Storage(artifact))
                .ctx(|| format!("creating directory {}", parent.display()))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            if artifact.is_secret() {
                options.mode(0o600);
            }
        }

        let mut file = options
            .open(&path)
            .foreign_err(|| Error::Storage(artifact))
            .ctx(|| format!("opening {}", path.display()))?;

        // `mode` only applies to newly created files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            if artifact.is_secret() {
                file.set_permissions(fs::Permissions::from_mode(0o600))
                    .foreign_err(|| Error::Storage(artifact))?;
            }
        }

        file.write_all(contents)
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_all())
            .foreign_err(|| Error::Storage(artifact))
            .ctx(|| format!("writing {}", path.display()))?;

        tracing::info!(%artifact, path = %path.display(), "wrote artifact");
        Ok(path)
    }

    /// Read the artifact back.
    pub fn read(&self, artifact: Artifact) -> Result<Vec<u8>, Error> {
        let path = self.path(artifact);
        fs::read(&path)
            .foreign_err(|| Error::Storage(artifact))
            .ctx(|| format!("reading {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_directories_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store.write(Artifact::SoftwareStatement, b"first").unwrap();
        store.write(Artifact::SoftwareStatement, b"second").unwrap();

        assert_eq!(path, dir.path().join("conf/ssa.jwt"));
        assert!(store.exists(Artifact::SoftwareStatement));
        assert_eq!(store.read(Artifact::SoftwareStatement).unwrap(), b"second");
    }

    #[test]
    fn missing_artifact_cannot_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let error = store.read(Artifact::SigningKey).unwrap_err();

        assert!(!store.exists(Artifact::SigningKey));
        assert_eq!(error.error, Error::Storage(Artifact::SigningKey));
    }

    #[cfg(unix)]
    #[test]
    fn secret_artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let key = store.write(Artifact::TransportKey, b"key").unwrap();
        let result = store.write(Artifact::RegistrationResult, b"{}").unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&key), 0o600);
        assert_eq!(mode(&result), 0o600);
    }
}
