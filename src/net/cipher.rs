//! Server-side cipher suite ordering.
//!
//! # Responsibilities
//! - Turn configured cipher names into a total order over the provider's suites
//! - Push suites that HTTP/2 forbids (RFC 7540 Appendix A) behind acceptable ones
//!
//! # Design Decisions
//! - Order key: (position in configured list, HTTP/2-forbidden, provider position)
//! - Unknown names fail configuration instead of being ignored
//! - The sorted list is installed into the crypto provider; rustls then honors it
//!   when `ignore_client_order` is set

use std::cmp::Ordering;

use rustls::{CipherSuite, SupportedCipherSuite};

use crate::net::tls::TlsError;

/// IANA-style name of a suite, e.g. `TLS13_AES_128_GCM_SHA256`.
pub fn suite_name(suite: &SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

/// Whether a suite is usable for HTTP/2: TLS 1.3, or an ephemeral key exchange
/// with an AEAD cipher on TLS 1.2.
pub fn is_h2_acceptable(name: &str) -> bool {
    if name.starts_with("TLS13_") {
        return true;
    }
    let ephemeral = name.starts_with("TLS_ECDHE_") || name.starts_with("TLS_DHE_");
    let aead = name.contains("_GCM_") || name.contains("CHACHA20_POLY1305") || name.contains("_CCM");
    ephemeral && aead
}

/// Total order over cipher suites used when the server picks the cipher.
#[derive(Debug, Clone, Default)]
pub struct CipherPreference {
    preferred: Vec<CipherSuite>,
}

impl CipherPreference {
    /// Resolve configured names against the suites the provider offers.
    pub fn from_names(names: &[String], available: &[SupportedCipherSuite]) -> Result<Self, TlsError> {
        let mut preferred = Vec::with_capacity(names.len());
        for name in names {
            let suite = available
                .iter()
                .find(|s| suite_name(s).eq_ignore_ascii_case(name))
                .ok_or_else(|| TlsError::UnknownCipherSuite(name.clone()))?;
            if !preferred.contains(&suite.suite()) {
                preferred.push(suite.suite());
            }
        }
        Ok(Self { preferred })
    }

    fn rank(&self, suite: &SupportedCipherSuite) -> (usize, bool) {
        let explicit = self
            .preferred
            .iter()
            .position(|p| *p == suite.suite())
            .unwrap_or(usize::MAX);
        (explicit, !is_h2_acceptable(&suite_name(suite)))
    }

    pub fn compare(&self, a: &SupportedCipherSuite, b: &SupportedCipherSuite) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    /// Stable sort, so ties keep the provider's order.
    pub fn sort(&self, suites: &mut [SupportedCipherSuite]) {
        suites.sort_by(|a, b| self.compare(a, b));
    }
}
