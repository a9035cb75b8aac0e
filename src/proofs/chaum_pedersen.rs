// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use crypto_bigint::rand_core::CryptoRngCore;
use merlin::Transcript;
use serde::Serialize;

use super::{ProofError, TranscriptProtocol};
use crate::{
    elgamal::{ElGamalCiphertext, ElGamalKeypair, ElGamalPublicKey, HashedElGamalCiphertext},
    group::{ElementModP, ElementModQ, GroupContext},
    ExtendedBaseHash,
};

const SELECTION_DOMAIN: u8 = 0x30;
const CONTEST_DATA_DOMAIN: u8 = 0x31;
const BLINDING_DOMAIN: u8 = 0x42;

/// A non-interactive Chaum-Pedersen proof of equality of discrete logs: given bases $(g_1, g_2)$
/// and images $(h_1, h_2)$, proves knowledge of $x$ with $h_1 = g_1^x$ and $h_2 = g_2^x$.
///
/// The prover commits to $(a, b) = (g_1^u, g_2^u)$ and responds with $v = u - c x$. The verifier
/// recomputes the commitments as $(g_1^v h_1^c, g_2^v h_2^c)$ and checks that they hash to $c$.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize)]
pub struct ChaumPedersenProof {
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

impl ChaumPedersenProof {
    pub fn new(challenge: ElementModQ, response: ElementModQ) -> Self {
        Self {
            challenge,
            response,
        }
    }

    /// Proves, as the holder of the full secret key, that `ciphertext` decrypts to
    /// $T = B / A^s$. Returns $T$ alongside the proof.
    pub fn prove_decryption(
        group: &GroupContext,
        extended_base_hash: &ExtendedBaseHash,
        keypair: &ElGamalKeypair,
        ciphertext: &ElGamalCiphertext,
        rng: &mut impl CryptoRngCore,
    ) -> (ElementModP, Self) {
        let secret = keypair.secret_key.0;
        let m = ciphertext.pad.pow(&secret);

        let u = group.random_element_mod_q(rng, 2);
        let a = group.g_pow_p(&u);
        let b = ciphertext.pad.pow(&u);

        let challenge = decryption_challenge(
            group,
            extended_base_hash,
            &keypair.public_key,
            ciphertext,
            &a,
            &b,
            &m,
        );

        (
            ciphertext.data / m,
            Self::new(challenge, u - challenge * secret),
        )
    }

    /// Verifies that $T = B / M$ where $M = A^s$ for the secret $s$ of `public_key`.
    pub fn verify_decryption(
        &self,
        group: &GroupContext,
        extended_base_hash: &ExtendedBaseHash,
        public_key: &ElGamalPublicKey,
        ciphertext: &ElGamalCiphertext,
        t: &ElementModP,
    ) -> Result<(), ProofError> {
        let m = ciphertext.data / t;
        let (a, b) = self.commitments(
            group.generator(),
            &ciphertext.pad,
            public_key.key(),
            &m,
        );

        let expected_challenge = decryption_challenge(
            group,
            extended_base_hash,
            public_key,
            ciphertext,
            &a,
            &b,
            &m,
        );

        self.check_challenge(&expected_challenge)
    }

    /// Verifies that $\beta = c_0^s$ for the secret $s$ of `public_key`.
    pub fn verify_contest_data(
        &self,
        group: &GroupContext,
        extended_base_hash: &ExtendedBaseHash,
        public_key: &ElGamalPublicKey,
        ciphertext: &HashedElGamalCiphertext,
        beta: &ElementModP,
    ) -> Result<(), ProofError> {
        let (a, b) = self.commitments(group.generator(), &ciphertext.c0, public_key.key(), beta);

        let expected_challenge = contest_data_challenge(
            group,
            extended_base_hash,
            public_key,
            ciphertext,
            &a,
            &b,
            beta,
        );

        self.check_challenge(&expected_challenge)
    }

    /// Verifies that `blinded` is `ratio` with both components raised to one common exponent.
    pub fn verify_blinding(
        &self,
        group: &GroupContext,
        extended_base_hash: &ExtendedBaseHash,
        public_key: &ElGamalPublicKey,
        ratio: &ElGamalCiphertext,
        blinded: &ElGamalCiphertext,
    ) -> Result<(), ProofError> {
        let (a, b) = self.commitments(&ratio.pad, &ratio.data, &blinded.pad, &blinded.data);

        let expected_challenge = blinding_challenge(
            group,
            extended_base_hash,
            public_key,
            ratio,
            blinded,
            &a,
            &b,
        );

        self.check_challenge(&expected_challenge)
    }

    fn commitments(
        &self,
        first_base: &ElementModP,
        second_base: &ElementModP,
        first_image: &ElementModP,
        second_image: &ElementModP,
    ) -> (ElementModP, ElementModP) {
        (
            first_base.pow(&self.response) * first_image.pow(&self.challenge),
            second_base.pow(&self.response) * second_image.pow(&self.challenge),
        )
    }

    fn check_challenge(&self, expected_challenge: &ElementModQ) -> Result<(), ProofError> {
        if &self.challenge == expected_challenge {
            Ok(())
        } else {
            Err(ProofError)
        }
    }
}

fn transcript(
    extended_base_hash: &ExtendedBaseHash,
    domain: u8,
    public_key: &ElGamalPublicKey,
) -> Transcript {
    let mut transcript = Transcript::new(b"Chaum-Pedersen Proof");
    transcript.append_message(b"extended base hash", extended_base_hash.as_bytes());
    transcript.append_message(b"domain separator", &[domain]);
    transcript.append_element_mod_p(b"K", public_key.key());

    transcript
}

/// The challenge of a selection decryption proof, binding the ciphertext, the commitments
/// $(a, b)$ and the combined share $M$.
pub(crate) fn decryption_challenge(
    group: &GroupContext,
    extended_base_hash: &ExtendedBaseHash,
    public_key: &ElGamalPublicKey,
    ciphertext: &ElGamalCiphertext,
    a: &ElementModP,
    b: &ElementModP,
    m: &ElementModP,
) -> ElementModQ {
    let mut transcript = transcript(extended_base_hash, SELECTION_DOMAIN, public_key);
    transcript.append_element_mod_p(b"A", &ciphertext.pad);
    transcript.append_element_mod_p(b"B", &ciphertext.data);
    transcript.append_element_mod_p(b"a", a);
    transcript.append_element_mod_p(b"b", b);
    transcript.append_element_mod_p(b"M", m);

    transcript.challenge_mod_q(b"c", group)
}

/// The challenge of a contest data decryption proof, binding all three ciphertext components,
/// the commitments $(a, b)$ and the combined share $\beta$.
pub(crate) fn contest_data_challenge(
    group: &GroupContext,
    extended_base_hash: &ExtendedBaseHash,
    public_key: &ElGamalPublicKey,
    ciphertext: &HashedElGamalCiphertext,
    a: &ElementModP,
    b: &ElementModP,
    beta: &ElementModP,
) -> ElementModQ {
    let mut transcript = transcript(extended_base_hash, CONTEST_DATA_DOMAIN, public_key);
    transcript.append_element_mod_p(b"c0", &ciphertext.c0);
    transcript.append_message(b"c1", &ciphertext.c1);
    transcript.append_message(b"c2", &ciphertext.c2);
    transcript.append_element_mod_p(b"a", a);
    transcript.append_element_mod_p(b"b", b);
    transcript.append_element_mod_p(b"beta", beta);

    transcript.challenge_mod_q(b"c", group)
}

/// The challenge of a blinding proof, binding the ratio ciphertext $(\alpha, \beta)$, its
/// blinding $(A, B)$ and the commitments $(a, b)$.
pub(crate) fn blinding_challenge(
    group: &GroupContext,
    extended_base_hash: &ExtendedBaseHash,
    public_key: &ElGamalPublicKey,
    ratio: &ElGamalCiphertext,
    blinded: &ElGamalCiphertext,
    a: &ElementModP,
    b: &ElementModP,
) -> ElementModQ {
    let mut transcript = transcript(extended_base_hash, BLINDING_DOMAIN, public_key);
    transcript.append_element_mod_p(b"alpha", &ratio.pad);
    transcript.append_element_mod_p(b"beta", &ratio.data);
    transcript.append_element_mod_p(b"A", &blinded.pad);
    transcript.append_element_mod_p(b"B", &blinded.data);
    transcript.append_element_mod_p(b"a", a);
    transcript.append_element_mod_p(b"b", b);

    transcript.challenge_mod_q(b"c", group)
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::test_exports::{test_extended_base_hash, test_group};

    #[test]
    fn valid_decryption_proof_verifies() {
        let group = test_group();
        let extended_base_hash = test_extended_base_hash();
        let keypair = ElGamalKeypair::random(&group, &mut OsRng);
        let nonce = group.random_element_mod_q(&mut OsRng, 1);
        let ciphertext = ElGamalCiphertext::encrypt(&group, 7, &keypair.public_key, &nonce);

        let (t, proof) = ChaumPedersenProof::prove_decryption(
            &group,
            &extended_base_hash,
            &keypair,
            &ciphertext,
            &mut OsRng,
        );

        assert_eq!(keypair.public_key.dlog(&group, &t, 100), Some(7));
        assert!(proof
            .verify_decryption(
                &group,
                &extended_base_hash,
                &keypair.public_key,
                &ciphertext,
                &t
            )
            .is_ok());
    }

    #[test]
    fn invalid_decryption_proof_fails_verification() {
        let group = test_group();
        let extended_base_hash = test_extended_base_hash();
        let keypair = ElGamalKeypair::random(&group, &mut OsRng);
        let nonce = group.random_element_mod_q(&mut OsRng, 1);
        let ciphertext = ElGamalCiphertext::encrypt(&group, 7, &keypair.public_key, &nonce);

        let (t, valid_proof) = ChaumPedersenProof::prove_decryption(
            &group,
            &extended_base_hash,
            &keypair,
            &ciphertext,
            &mut OsRng,
        );
        let verify = |proof: &ChaumPedersenProof, t: &ElementModP| {
            proof.verify_decryption(
                &group,
                &extended_base_hash,
                &keypair.public_key,
                &ciphertext,
                t,
            )
        };

        /* Claiming a different plaintext must fail */
        let wrong_t = t * keypair.public_key.key();
        assert_eq!(verify(&valid_proof, &wrong_t), Err(ProofError));

        /* Now make sure that if we change any field it fails */
        let mut invalid_proof = valid_proof;
        invalid_proof.challenge = invalid_proof.challenge + group.one_mod_q();
        assert_eq!(verify(&invalid_proof, &t), Err(ProofError));

        invalid_proof = valid_proof;
        invalid_proof.response = invalid_proof.response + group.one_mod_q();
        assert_eq!(verify(&invalid_proof, &t), Err(ProofError));

        /* A different extended base hash yields a different challenge */
        assert_eq!(
            valid_proof.verify_decryption(
                &group,
                &ExtendedBaseHash::new([7u8; 32]),
                &keypair.public_key,
                &ciphertext,
                &t
            ),
            Err(ProofError)
        );
    }

    #[test]
    fn challenges_are_domain_separated() {
        let group = test_group();
        let extended_base_hash = test_extended_base_hash();
        let keypair = ElGamalKeypair::random(&group, &mut OsRng);
        let nonce = group.random_element_mod_q(&mut OsRng, 1);
        let ciphertext = ElGamalCiphertext::encrypt(&group, 1, &keypair.public_key, &nonce);
        let a = group.g_pow_p(&group.random_element_mod_q(&mut OsRng, 1));
        let b = group.g_pow_p(&group.random_element_mod_q(&mut OsRng, 1));

        let selection_challenge = decryption_challenge(
            &group,
            &extended_base_hash,
            &keypair.public_key,
            &ciphertext,
            &a,
            &b,
            &ciphertext.pad,
        );
        let blinding = blinding_challenge(
            &group,
            &extended_base_hash,
            &keypair.public_key,
            &ciphertext,
            &ElGamalCiphertext::new(ciphertext.pad, ciphertext.pad),
            &a,
            &b,
        );

        assert_ne!(selection_challenge, blinding);
        assert_eq!(
            selection_challenge,
            decryption_challenge(
                &group,
                &extended_base_hash,
                &keypair.public_key,
                &ciphertext,
                &a,
                &b,
                &ciphertext.pad,
            )
        );
    }

    #[test]
    fn blinding_proof_verifies() {
        let group = test_group();
        let extended_base_hash = test_extended_base_hash();
        let keypair = ElGamalKeypair::random(&group, &mut OsRng);
        let nonce = group.random_element_mod_q(&mut OsRng, 1);
        let ratio = ElGamalCiphertext::encrypt(&group, 1, &keypair.public_key, &nonce);

        let epsilon = group.random_element_mod_q(&mut OsRng, 2);
        let u = group.random_element_mod_q(&mut OsRng, 2);
        let blinded = ratio.pow(&epsilon);
        let commitment = ratio.pow(&u);

        let challenge = blinding_challenge(
            &group,
            &extended_base_hash,
            &keypair.public_key,
            &ratio,
            &blinded,
            &commitment.pad,
            &commitment.data,
        );
        let valid_proof = ChaumPedersenProof::new(challenge, u - challenge * epsilon);

        assert!(valid_proof
            .verify_blinding(
                &group,
                &extended_base_hash,
                &keypair.public_key,
                &ratio,
                &blinded
            )
            .is_ok());

        let reblinded = ratio.pow(&(epsilon + group.one_mod_q()));
        assert_eq!(
            valid_proof.verify_blinding(
                &group,
                &extended_base_hash,
                &keypair.public_key,
                &ratio,
                &reblinded
            ),
            Err(ProofError)
        );
    }
}
