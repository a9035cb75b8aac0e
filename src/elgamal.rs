// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use crypto_bigint::rand_core::CryptoRngCore;
use serde::Serialize;

use crate::group::{ElementModP, ElementModQ, GroupContext};

pub use hashed::HashedElGamalCiphertext;

mod hashed;

/// An ElGamal public key $K = g^s$, which is also the base of the exponential encoding of votes.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize)]
pub struct ElGamalPublicKey(ElementModP);

impl ElGamalPublicKey {
    pub fn new(key: ElementModP) -> Self {
        Self(key)
    }

    pub fn key(&self) -> &ElementModP {
        &self.0
    }

    /// Finds $t \le \text{max}$ with $K^t = \text{value}$.
    pub fn dlog(&self, group: &GroupContext, value: &ElementModP, max: u32) -> Option<u32> {
        let mut power = group.one_mod_p();

        for exponent in 0..=max {
            if &power == value {
                return Some(exponent);
            }
            power *= self.0;
        }

        None
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ElGamalSecretKey(pub(crate) ElementModQ);

impl ElGamalSecretKey {
    pub fn new(secret: ElementModQ) -> Self {
        Self(secret)
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ElGamalKeypair {
    pub secret_key: ElGamalSecretKey,
    pub public_key: ElGamalPublicKey,
}

impl ElGamalKeypair {
    pub fn from_secret(group: &GroupContext, secret: ElementModQ) -> Self {
        Self {
            public_key: ElGamalPublicKey(group.g_pow_p(&secret)),
            secret_key: ElGamalSecretKey(secret),
        }
    }

    pub fn random(group: &GroupContext, rng: &mut impl CryptoRngCore) -> Self {
        Self::from_secret(group, group.random_element_mod_q(rng, 2))
    }
}

/// An exponential ElGamal ciphertext $(A, B) = (g^\xi, K^{m + \xi})$.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize)]
pub struct ElGamalCiphertext {
    pub pad: ElementModP,
    pub data: ElementModP,
}

impl ElGamalCiphertext {
    pub fn new(pad: ElementModP, data: ElementModP) -> Self {
        Self { pad, data }
    }

    pub fn encrypt(
        group: &GroupContext,
        vote: u32,
        public_key: &ElGamalPublicKey,
        nonce: &ElementModQ,
    ) -> Self {
        let exponent = group.element_mod_q_from_u64(u64::from(vote)) + nonce;

        Self {
            pad: group.g_pow_p(nonce),
            data: public_key.0.pow(&exponent),
        }
    }

    /// The homomorphic sum of the encrypted votes.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            pad: self.pad * other.pad,
            data: self.data * other.data,
        }
    }

    /// The component-wise quotient, which encrypts the difference of the votes.
    pub fn ratio(&self, other: &Self) -> Self {
        Self {
            pad: self.pad / other.pad,
            data: self.data / other.data,
        }
    }

    /// Raises both components to `exponent`, which multiplies the encrypted vote by it.
    pub fn pow(&self, exponent: &ElementModQ) -> Self {
        Self {
            pad: self.pad.pow(exponent),
            data: self.data.pow(exponent),
        }
    }

    pub fn is_one(&self) -> bool {
        self.pad.is_one() && self.data.is_one()
    }

    /// Decrypts with the full secret key, returning $T = B / A^s$ and its discrete log if it is
    /// within `max_dlog`.
    pub fn decrypt(
        &self,
        group: &GroupContext,
        keypair: &ElGamalKeypair,
        max_dlog: u32,
    ) -> (ElementModP, Option<u32>) {
        let t = self.data / self.pad.pow(&keypair.secret_key.0);

        (t, keypair.public_key.dlog(group, &t, max_dlog))
    }
}
