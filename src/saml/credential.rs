//! Service provider signing/encryption credential.

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::path::Path;
use tracing::info;

use crate::error::StartupError;

/// Certificate and RSA private key identifying this service provider.
#[derive(Clone)]
pub struct Credential {
    certificate: X509,
    private_key: PKey<Private>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &subject_name(&self.certificate))
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// Load a PEM certificate and PEM private key from disk.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, StartupError> {
        let cert_pem = read_file(cert_path)?;
        let key_pem = read_file(key_path)?;
        let credential = Self::from_pem(&cert_pem, &key_pem)?;

        info!(
            cert = %cert_path.display(),
            subject = %subject_name(&credential.certificate),
            not_after = %credential.certificate.not_after(),
            "Loaded service provider credential"
        );

        Ok(credential)
    }

    /// Build a credential from PEM-encoded certificate and key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, StartupError> {
        let certificate = X509::from_pem(cert_pem).map_err(StartupError::CertificateParse)?;
        let private_key =
            PKey::private_key_from_pem(key_pem).map_err(StartupError::PrivateKeyParse)?;
        Self::new(certificate, private_key)
    }

    /// Pair a certificate with its private key, checking they belong together.
    pub fn new(certificate: X509, private_key: PKey<Private>) -> Result<Self, StartupError> {
        if private_key.rsa().is_err() {
            return Err(StartupError::UnsupportedKey);
        }

        let public_key = certificate
            .public_key()
            .map_err(StartupError::CertificateParse)?;
        if !public_key.public_eq(&private_key) {
            return Err(StartupError::KeyMismatch);
        }

        Ok(Self {
            certificate,
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// DER encoding of the certificate.
    pub fn certificate_der(&self) -> Result<Vec<u8>, StartupError> {
        self.certificate
            .to_der()
            .map_err(StartupError::CertificateParse)
    }

    /// PKCS#1 PEM of the private key, for signing session tokens.
    pub fn private_key_pem(&self) -> Result<Vec<u8>, StartupError> {
        self.private_key
            .rsa()
            .and_then(|rsa| rsa.private_key_to_pem())
            .map_err(|e| StartupError::SessionKey(e.to_string()))
    }

    /// SubjectPublicKeyInfo PEM of the public key, for verifying session tokens.
    pub fn public_key_pem(&self) -> Result<Vec<u8>, StartupError> {
        self.private_key
            .public_key_to_pem()
            .map_err(|e| StartupError::SessionKey(e.to_string()))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, StartupError> {
    std::fs::read(path).map_err(|source| StartupError::CredentialRead {
        path: path.to_path_buf(),
        source,
    })
}

fn subject_name(certificate: &X509) -> String {
    certificate
        .subject_name()
        .entries()
        .filter_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}
