// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use crypto_bigint::{U256, U4096, U512};
use serde::Serialize;

pub mod ballot;
pub mod decryptions;
pub mod decryptor;
pub mod elgamal;
mod error;
pub mod error_messages;
pub mod group;
pub mod guardians;
pub mod lagrange;
pub mod pep;
pub mod proofs;
mod secret_sharing;
pub mod tally_decryptor;
pub mod trustee;

pub use decryptor::{public_parameters::PublicParameters, Decryptor, ShareCombination};
pub use error::{ConfigurationError, Error, ProtocolError, Result, SanityCheckError};
pub use error_messages::ErrorMessages;
pub use secret_sharing::shamir::Polynomial;

/* Types & Trait (impls) around `crypto_bigint` for internal use */

pub type ElementModPSizedNumber = U4096;
pub type ElementModQSizedNumber = U256;
/// The width challenges are drawn at before being reduced modulo $q$.
pub(crate) type WideChallengeSizedNumber = U512;

pub(crate) const P_LIMBS: usize = ElementModPSizedNumber::LIMBS;
pub(crate) const Q_LIMBS: usize = ElementModQSizedNumber::LIMBS;

/// The extended base hash $H_E$ of an election, which every proof and every contest data
/// ciphertext is bound to.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize)]
pub struct ExtendedBaseHash([u8; 32]);

impl ExtendedBaseHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(any(test, feature = "test_exports"))]
pub mod test_exports;
