use blst::BLST_ERROR;
use blst::min_sig::{PublicKey, Signature};

/// Hash-to-curve domain separation tag the IC uses for state root
/// signatures.
const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// A pluggable BLS verification backend: `(public_key, signature, message)`.
///
/// The public key is the 96-byte G2 point, the signature the 48-byte G1
/// point. Returning `false` (for any reason, including malformed inputs)
/// makes certificate verification fail with
/// [`CertificationError::SignatureInvalid`](crate::CertificationError::SignatureInvalid).
pub type BlsVerifier = fn(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool;

/// Verifies a BLS12-381 signature in the IC's configuration: 48-byte
/// signatures on G1, 96-byte public keys on G2.
pub fn verify_bls_signature(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::key_validate(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_bytes(signature) else {
        return false;
    };
    signature.verify(true, message, BLS_DST, &[], &public_key, false) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_inputs_do_not_verify() {
        assert!(!verify_bls_signature(&[0u8; 96], &[0u8; 48], b"msg"));
        assert!(!verify_bls_signature(b"short", b"sig", b"msg"));
        assert!(!verify_bls_signature(&[0u8; 96], &[], b"msg"));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        use blst::min_sig::SecretKey;

        let sk = SecretKey::key_gen(&[0x42; 32], &[]).unwrap();
        let pk = sk.sk_to_pk();
        let message = b"certified state root";
        let sig = sk.sign(message, BLS_DST, &[]);

        assert!(verify_bls_signature(
            &pk.to_bytes(),
            &sig.to_bytes(),
            message
        ));
        assert!(!verify_bls_signature(
            &pk.to_bytes(),
            &sig.to_bytes(),
            b"some other message"
        ));
    }
}
