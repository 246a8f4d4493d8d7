use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Error};
use rustls::crypto::ring::{default_provider, DEFAULT_CIPHER_SUITES};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};

use crate::tls::insecure::AcceptAnyServerCert;

/// Client TLS configuration: webpki roots by default, the PEM bundle at
/// `ca_bundle` when given, and no certificate validation at all when
/// `insecure` is set.
pub fn client_config(ca_bundle: Option<&Path>, insecure: bool) -> Result<ClientConfig, Error> {
    let mut root_store = RootCertStore::empty();
    if let Some(path) = ca_bundle {
        let f = std::fs::File::open(path)
            .with_context(|| format!("failed to open ca bundle {}", path.display()))?;
        let mut rd = std::io::BufReader::new(f);
        for cert in rustls_pemfile::certs(&mut rd) {
            root_store.add(cert?)?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let provider = CryptoProvider {
        cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
        ..default_provider()
    };
    let mut config = ClientConfig::builder_with_provider(provider.into())
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if insecure {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyServerCert::new(default_provider())));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = client_config(None, false).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn insecure_config_builds() {
        client_config(None, true).unwrap();
    }

    #[test]
    fn missing_ca_bundle_is_an_error() {
        let err = client_config(Some(Path::new("/no/such/bundle.pem")), false).unwrap_err();
        assert!(err.to_string().contains("bundle"));
    }
}
