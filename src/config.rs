use std::sync::Arc;

use crate::certificate::{CertificateValidator, Identity};
use crate::crypto::provider::CryptoProvider;
use crate::crypto::rust_crypto;
use crate::ephemeral::EphemeralKeyCache;
use crate::types::{
    CipherSuite, CipherSuiteVec, ClientAuth, NamedGroup, NamedGroupVec, ProtocolVersion,
    SignatureScheme, SignatureSchemeVec, VersionVec,
};
use crate::Error;

/// Handshake configuration, shared by any number of contexts.
#[derive(Debug, Clone)]
pub struct Config {
    versions: VersionVec,
    cipher_suites: CipherSuiteVec,
    groups: NamedGroupVec,
    signature_schemes: SignatureSchemeVec,
    client_auth: ClientAuth,
    require_cookie: bool,
    tolerate_no_certificate: bool,
    with_extended_master_secret: bool,
    request_stapling: bool,
    stapled_response: Option<Vec<u8>>,
    session_tickets: u8,
    identity: Option<Identity>,
    validator: Option<Arc<dyn CertificateValidator>>,
    ephemeral_cache: Option<Arc<EphemeralKeyCache>>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            versions: ProtocolVersion::supported().iter().copied().collect(),
            cipher_suites: CipherSuite::supported().iter().copied().collect(),
            groups: NamedGroup::supported().iter().copied().collect(),
            signature_schemes: SignatureScheme::supported()
                .iter()
                .copied()
                .collect(),
            client_auth: ClientAuth::None,
            require_cookie: false,
            tolerate_no_certificate: true,
            with_extended_master_secret: true,
            request_stapling: false,
            stapled_response: None,
            session_tickets: 1,
            identity: None,
            validator: None,
            ephemeral_cache: None,
            crypto_provider: None,
        }
    }

    /// Protocol versions on offer, preference order.
    #[inline(always)]
    pub fn versions(&self) -> &VersionVec {
        &self.versions
    }

    /// Cipher suites on offer, preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &CipherSuiteVec {
        &self.cipher_suites
    }

    /// Key exchange groups on offer, preference order.
    #[inline(always)]
    pub fn groups(&self) -> &NamedGroupVec {
        &self.groups
    }

    /// Signature schemes acceptable for peer signatures, preference order.
    #[inline(always)]
    pub fn signature_schemes(&self) -> &SignatureSchemeVec {
        &self.signature_schemes
    }

    /// Whether a server asks for, or insists on, a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// For a server, demand a valid retry cookie before doing real work.
    ///
    /// The first hello is answered with a retry request carrying a cookie;
    /// only a hello echoing it back gets a full handshake.
    #[inline(always)]
    pub fn require_cookie(&self) -> bool {
        self.require_cookie
    }

    /// Accept a no-certificate warning when client auth was merely
    /// requested (not required).
    #[inline(always)]
    pub fn tolerate_no_certificate(&self) -> bool {
        self.tolerate_no_certificate
    }

    /// Whether to offer Extended Master Secret (RFC 7627) on pre-1.3
    /// versions.
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }

    /// For a client, ask the server to staple an OCSP response.
    #[inline(always)]
    pub fn request_stapling(&self) -> bool {
        self.request_stapling
    }

    /// For a server, the OCSP response to staple when a client asks.
    #[inline(always)]
    pub fn stapled_response(&self) -> Option<&[u8]> {
        self.stapled_response.as_deref()
    }

    /// How many session tickets a 1.3 server issues after the handshake.
    #[inline(always)]
    pub fn session_tickets(&self) -> u8 {
        self.session_tickets
    }

    /// The local certificate chain and private key.
    #[inline(always)]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The validator consulted for peer certificate chains.
    #[inline(always)]
    pub fn validator(&self) -> Option<&Arc<dyn CertificateValidator>> {
        self.validator.as_ref()
    }

    /// Cache of server ephemeral key exchange keys, shared across contexts.
    #[inline(always)]
    pub fn ephemeral_cache(&self) -> Option<&Arc<EphemeralKeyCache>> {
        self.ephemeral_cache.as_ref()
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (hashing, key exchange,
    /// signing, HKDF/PRF).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

/// Builder for handshake configuration.
pub struct ConfigBuilder {
    versions: VersionVec,
    cipher_suites: CipherSuiteVec,
    groups: NamedGroupVec,
    signature_schemes: SignatureSchemeVec,
    client_auth: ClientAuth,
    require_cookie: bool,
    tolerate_no_certificate: bool,
    with_extended_master_secret: bool,
    request_stapling: bool,
    stapled_response: Option<Vec<u8>>,
    session_tickets: u8,
    identity: Option<Identity>,
    validator: Option<Arc<dyn CertificateValidator>>,
    ephemeral_cache: Option<Arc<EphemeralKeyCache>>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the protocol versions to offer, preference order.
    ///
    /// Defaults to everything supported, 1.3-family first.
    pub fn versions(mut self, versions: impl IntoIterator<Item = ProtocolVersion>) -> Self {
        self.versions = versions.into_iter().collect();
        self
    }

    /// Set the cipher suites to offer, preference order.
    pub fn cipher_suites(
        mut self,
        suites: impl IntoIterator<Item = CipherSuite>,
    ) -> Self {
        self.cipher_suites = suites.into_iter().collect();
        self
    }

    /// Set the key exchange groups to offer, preference order.
    pub fn groups(mut self, groups: impl IntoIterator<Item = NamedGroup>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// Set the acceptable signature schemes, preference order.
    pub fn signature_schemes(
        mut self,
        schemes: impl IntoIterator<Item = SignatureScheme>,
    ) -> Self {
        self.signature_schemes = schemes.into_iter().collect();
        self
    }

    /// Set whether a server asks for, or insists on, a client certificate.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Set whether a server demands a retry cookie before committing state.
    ///
    /// Defaults to false.
    pub fn require_cookie(mut self, require: bool) -> Self {
        self.require_cookie = require;
        self
    }

    /// Set whether a no-certificate warning is tolerated under requested
    /// (not required) client auth.
    ///
    /// Defaults to true.
    pub fn tolerate_no_certificate(mut self, tolerate: bool) -> Self {
        self.tolerate_no_certificate = tolerate;
        self
    }

    /// Set whether to offer Extended Master Secret (RFC 7627).
    ///
    /// Only affects pre-1.3 versions. Defaults to true.
    pub fn with_extended_master_secret(mut self, enable: bool) -> Self {
        self.with_extended_master_secret = enable;
        self
    }

    /// Set whether a client asks the server to staple an OCSP response.
    ///
    /// Defaults to false.
    pub fn request_stapling(mut self, request: bool) -> Self {
        self.request_stapling = request;
        self
    }

    /// Set the OCSP response a server staples when asked.
    pub fn stapled_response(mut self, response: Vec<u8>) -> Self {
        self.stapled_response = Some(response);
        self
    }

    /// Set how many session tickets a 1.3 server issues after the
    /// handshake. Zero disables tickets.
    ///
    /// Defaults to 1.
    pub fn session_tickets(mut self, count: u8) -> Self {
        self.session_tickets = count;
        self
    }

    /// Set the local certificate chain and private key.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the validator consulted for peer certificate chains.
    pub fn validator(mut self, validator: Arc<dyn CertificateValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Share an ephemeral key cache between server contexts.
    ///
    /// Without one, every legacy handshake generates a fresh server key
    /// exchange key.
    pub fn ephemeral_cache(mut self, cache: Arc<EphemeralKeyCache>) -> Self {
        self.ephemeral_cache = Some(cache);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, a default installed via
    /// [`CryptoProvider::install_default`] is used, falling back to the
    /// bundled RustCrypto provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// Validates that the offer lists can negotiate anything at all.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The bundled RustCrypto provider
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        if self.versions.is_empty() {
            return Err(Error::Config("no protocol versions configured"));
        }
        if self.groups.is_empty() {
            return Err(Error::Config("no key exchange groups configured"));
        }
        if self.signature_schemes.is_empty() {
            return Err(Error::Config("no signature schemes configured"));
        }

        let usable_suite = self.cipher_suites.iter().any(|suite| {
            self.versions.iter().any(|version| suite.usable_with(*version))
        });
        if !usable_suite {
            return Err(Error::Config(
                "no cipher suite is usable with any configured version",
            ));
        }

        for suite in &self.cipher_suites {
            if crypto_provider.supported_suite(*suite).is_none() {
                return Err(Error::Config(
                    "a configured cipher suite has no provider implementation",
                ));
            }
        }
        for group in &self.groups {
            if crypto_provider.supported_group(*group).is_none() {
                return Err(Error::Config(
                    "a configured group has no provider implementation",
                ));
            }
        }

        // Certificate messages carry at most eight chain entries.
        if let Some(identity) = &self.identity {
            if identity.certificates.is_empty() {
                return Err(Error::Config("identity has no certificate"));
            }
            if identity.certificates.len() > 8 {
                return Err(Error::Config("identity chain longer than eight certificates"));
            }
        }

        Ok(Config {
            versions: self.versions,
            cipher_suites: self.cipher_suites,
            groups: self.groups,
            signature_schemes: self.signature_schemes,
            client_auth: self.client_auth,
            require_cookie: self.require_cookie,
            tolerate_no_certificate: self.tolerate_no_certificate,
            with_extended_master_secret: self.with_extended_master_secret,
            request_stapling: self.request_stapling,
            stapled_response: self.stapled_response,
            session_tickets: self.session_tickets,
            identity: self.identity,
            validator: self.validator,
            ephemeral_cache: self.ephemeral_cache,
            crypto_provider,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
