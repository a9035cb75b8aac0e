// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use merlin::Transcript;
use serde::Serialize;
use subtle::ConstantTimeEq;

use super::{ElGamalKeypair, ElGamalPublicKey};
use crate::{
    group::{ElementModP, ElementModQ, GroupContext},
    proofs::TranscriptProtocol,
};

pub const MAC_SIZE: usize = 32;

/// A hashed ElGamal ciphertext of an arbitrary-length message.
///
/// `c0` is $g^\xi$. The message is masked by a keystream derived from $\beta = K^\xi$ into `c1`,
/// and `c2` authenticates `c0` and `c1`.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct HashedElGamalCiphertext {
    pub c0: ElementModP,
    pub c1: Vec<u8>,
    pub c2: [u8; MAC_SIZE],
}

impl HashedElGamalCiphertext {
    /// Encrypts `message` to `public_key`. `domain` and `label` bind the ciphertext to its context;
    /// decryption must be given the same values.
    pub fn encrypt(
        group: &GroupContext,
        message: &[u8],
        public_key: &ElGamalPublicKey,
        domain: &[u8],
        label: &[u8],
        nonce: &ElementModQ,
    ) -> Self {
        let c0 = group.g_pow_p(nonce);
        let beta = public_key.key().pow(nonce);

        let (keystream, mac_key) =
            derive_keys(domain, public_key, &c0, &beta, label, message.len());
        let c1: Vec<u8> = message
            .iter()
            .zip(keystream.iter())
            .map(|(byte, key)| byte ^ key)
            .collect();
        let c2 = mac(&mac_key, &c0, &c1);

        Self { c0, c1, c2 }
    }

    /// Decrypts given the shared secret $\beta = c_0^s$, returning `None` if the ciphertext fails
    /// authentication.
    pub fn decrypt_with_beta(
        &self,
        public_key: &ElGamalPublicKey,
        domain: &[u8],
        label: &[u8],
        beta: &ElementModP,
    ) -> Option<Vec<u8>> {
        let (keystream, mac_key) =
            derive_keys(domain, public_key, &self.c0, beta, label, self.c1.len());
        let expected_mac = mac(&mac_key, &self.c0, &self.c1);

        if !bool::from(expected_mac.as_slice().ct_eq(self.c2.as_slice())) {
            return None;
        }

        Some(
            self.c1
                .iter()
                .zip(keystream.iter())
                .map(|(byte, key)| byte ^ key)
                .collect(),
        )
    }

    pub fn decrypt(
        &self,
        keypair: &ElGamalKeypair,
        domain: &[u8],
        label: &[u8],
    ) -> Option<Vec<u8>> {
        let beta = self.c0.pow(&keypair.secret_key.0);

        self.decrypt_with_beta(&keypair.public_key, domain, label, &beta)
    }
}

fn derive_keys(
    domain: &[u8],
    public_key: &ElGamalPublicKey,
    c0: &ElementModP,
    beta: &ElementModP,
    label: &[u8],
    length: usize,
) -> (Vec<u8>, [u8; MAC_SIZE]) {
    let mut transcript = Transcript::new(b"Hashed ElGamal");
    transcript.append_message(b"domain", domain);
    transcript.append_element_mod_p(b"K", public_key.key());
    transcript.append_element_mod_p(b"c0", c0);
    transcript.append_element_mod_p(b"beta", beta);
    transcript.append_message(b"label", label);

    let mut mac_key = [0u8; MAC_SIZE];
    transcript.challenge_bytes(b"mac key", &mut mac_key);

    let mut keystream = vec![0u8; length];
    transcript.challenge_bytes(b"keystream", &mut keystream);

    (keystream, mac_key)
}

fn mac(mac_key: &[u8; MAC_SIZE], c0: &ElementModP, c1: &[u8]) -> [u8; MAC_SIZE] {
    let mut transcript = Transcript::new(b"Hashed ElGamal MAC");
    transcript.append_message(b"mac key", mac_key);
    transcript.append_element_mod_p(b"c0", c0);
    transcript.append_message(b"c1", c1);

    let mut mac = [0u8; MAC_SIZE];
    transcript.challenge_bytes(b"mac", &mut mac);

    mac
}
