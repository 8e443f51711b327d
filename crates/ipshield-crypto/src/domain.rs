/// Domain-separated BLAKE3 hasher for ledger bookkeeping.
///
/// Each hasher carries a domain tag (e.g. `"ipshield-write-v1"`) that is
/// prepended to every hash computation, so a write reference and a signing
/// payload over identical bytes never share a digest.
///
/// Content fingerprints do not use this type; see
/// [`ContentHasher`](crate::ContentHasher).
pub struct DomainHasher {
    domain: &'static str,
}

impl DomainHasher {
    /// Hasher for ledger write references.
    pub const WRITE_REFERENCE: Self = Self {
        domain: "ipshield-write-v1",
    };
    /// Hasher for the payload a signing identity authorizes.
    pub const SIGNING_PAYLOAD: Self = Self {
        domain: "ipshield-sign-v1",
    };
    /// Hasher for synthesized registry deployment addresses.
    pub const DEPLOYMENT: Self = Self {
        domain: "ipshield-deploy-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash a single byte string with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash_parts(&[data])
    }

    /// Hash several fields; each is length-prefixed so field boundaries are
    /// unambiguous.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
