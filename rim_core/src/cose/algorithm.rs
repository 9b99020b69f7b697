use core::fmt;

use tracing::debug;

use super::{SignError, SigningKey};

/// COSE algorithm identifiers (RFC 9053, RFC 8230) this signer can produce.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA w/ SHA-256 on P-256.
    ES256 = -7,
    /// ECDSA w/ SHA-384 on P-384.
    ES384 = -35,
    /// ECDSA w/ SHA-512 on P-521.
    ES512 = -36,
    /// Ed25519.
    EdDSA = -8,
    /// RSASSA-PSS w/ SHA-256.
    PS256 = -37,
    PS384 = -38,
    PS512 = -39,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::ES512,
        Algorithm::EdDSA,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
    ];

    /// Value of the COSE `alg` header.
    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.id() == id)
    }

    /// JOSE / COSE name, e.g. `"ES256"`.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::ES256 => "ES256",
            Algorithm::ES384 => "ES384",
            Algorithm::ES512 => "ES512",
            Algorithm::EdDSA => "EdDSA",
            Algorithm::PS256 => "PS256",
            Algorithm::PS384 => "PS384",
            Algorithm::PS512 => "PS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Elliptic curve of an EC key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
    /// Any curve this signer has no algorithm for, by its JWK name.
    Other(String),
}

impl Curve {
    pub fn from_name(name: &str) -> Self {
        match name {
            "P-256" => Curve::P256,
            "P-384" => Curve::P384,
            "P-521" => Curve::P521,
            other => Curve::Other(other.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
            Curve::Other(name) => name,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Picks the signature algorithm for `key`.
///
/// | Key | Algorithm |
/// |---|---|
/// | EC P-256 / P-384 / P-521 | ES256 / ES384 / ES512 |
/// | Ed25519 | EdDSA |
/// | RSA with `alg` PS256 / PS384 / PS512 | PS256 / PS384 / PS512 |
///
/// The first matching row wins. Anything else is an error naming the
/// unsupported curve, RSA algorithm or key type; there is no fallback.
pub fn infer_signing_algorithm<K: SigningKey + ?Sized>(
    key: &K,
) -> Result<(Algorithm, &K), SignError> {
    let algorithm = if let Some(curve) = key.curve() {
        match curve {
            Curve::P256 => Algorithm::ES256,
            Curve::P384 => Algorithm::ES384,
            Curve::P521 => Algorithm::ES512,
            other @ Curve::Other(_) => return Err(SignError::UnsupportedCurve(other)),
        }
    } else if key.is_edwards25519() {
        Algorithm::EdDSA
    } else if key.is_rsa() {
        match key.algorithm_hint() {
            Some("PS256") => Algorithm::PS256,
            Some("PS384") => Algorithm::PS384,
            Some("PS512") => Algorithm::PS512,
            hint => {
                return Err(SignError::UnsupportedRsaAlgorithm(hint.map(str::to_owned)));
            }
        }
    } else {
        return Err(SignError::UnsupportedKeyType(key.key_type().to_owned()));
    };

    debug!(%algorithm, key_type = key.key_type(), "inferred signing algorithm");
    Ok((algorithm, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct FakeKey {
        kty: &'static str,
        curve: Option<Curve>,
        edwards: bool,
        rsa: bool,
        alg: Option<&'static str>,
    }

    impl SigningKey for FakeKey {
        fn key_type(&self) -> &str {
            self.kty
        }

        fn curve(&self) -> Option<Curve> {
            self.curve.clone()
        }

        fn is_edwards25519(&self) -> bool {
            self.edwards
        }

        fn is_rsa(&self) -> bool {
            self.rsa
        }

        fn algorithm_hint(&self) -> Option<&str> {
            self.alg
        }

        fn sign(&self, _: Algorithm, _: &[u8]) -> Result<Vec<u8>, SignError> {
            Ok(Vec::new())
        }
    }

    fn ec(curve: Curve) -> FakeKey {
        FakeKey {
            kty: "EC",
            curve: Some(curve),
            ..Default::default()
        }
    }

    fn rsa(alg: Option<&'static str>) -> FakeKey {
        FakeKey {
            kty: "RSA",
            rsa: true,
            alg,
            ..Default::default()
        }
    }

    #[test]
    fn test_algorithm_ids() {
        assert_eq!(Algorithm::ES256.id(), -7);
        assert_eq!(Algorithm::ES384.id(), -35);
        assert_eq!(Algorithm::ES512.id(), -36);
        assert_eq!(Algorithm::EdDSA.id(), -8);
        assert_eq!(Algorithm::PS256.id(), -37);
        assert_eq!(Algorithm::PS384.id(), -38);
        assert_eq!(Algorithm::PS512.id(), -39);
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_id(alg.id()), Some(alg));
        }
        assert_eq!(Algorithm::from_id(-257), None);
    }

    #[test]
    fn test_infer_ec() {
        for (curve, expected) in [
            (Curve::P256, Algorithm::ES256),
            (Curve::P384, Algorithm::ES384),
            (Curve::P521, Algorithm::ES512),
        ] {
            let key = ec(curve);
            let (alg, _) = infer_signing_algorithm(&key).unwrap();
            assert_eq!(alg, expected);
        }
    }

    #[test]
    fn test_infer_unsupported_curve() {
        let key = ec(Curve::from_name("secp256k1"));
        match infer_signing_algorithm(&key) {
            Err(SignError::UnsupportedCurve(curve)) => assert_eq!(curve.name(), "secp256k1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_infer_ed25519() {
        let key = FakeKey {
            kty: "OKP",
            edwards: true,
            ..Default::default()
        };
        let (alg, _) = infer_signing_algorithm(&key).unwrap();
        assert_eq!(alg, Algorithm::EdDSA);
    }

    #[test]
    fn test_infer_rsa() {
        for (hint, expected) in [
            ("PS256", Algorithm::PS256),
            ("PS384", Algorithm::PS384),
            ("PS512", Algorithm::PS512),
        ] {
            let key = rsa(Some(hint));
            let (alg, _) = infer_signing_algorithm(&key).unwrap();
            assert_eq!(alg, expected);
        }
    }

    #[test]
    fn test_infer_rsa_without_pss_hint() {
        for hint in [Some("RS256"), Some("ps256"), None] {
            let key = rsa(hint);
            match infer_signing_algorithm(&key) {
                Err(SignError::UnsupportedRsaAlgorithm(got)) => {
                    assert_eq!(got.as_deref(), hint)
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_infer_unknown_key_type() {
        let key = FakeKey {
            kty: "oct",
            ..Default::default()
        };
        match infer_signing_algorithm(&key) {
            Err(SignError::UnsupportedKeyType(kty)) => assert_eq!(kty, "oct"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_infer_returns_same_key() {
        let key = ec(Curve::P256);
        let (_, returned) = infer_signing_algorithm(&key).unwrap();
        assert!(std::ptr::eq(returned, &key));
    }
}
