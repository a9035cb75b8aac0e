// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use serde::Serialize;

use crate::{
    elgamal::ElGamalPublicKey, group::GroupContext, guardians::Guardians, ExtendedBaseHash,
    Result, SanityCheckError,
};

/// The largest vote count a selection is expected to decrypt to, unless configured otherwise.
pub const DEFAULT_MAX_DLOG: u32 = 1000;

/// The public election record a decryption is performed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicParameters {
    pub group: GroupContext,
    // The extended base hash $H_E$ every proof is bound to.
    pub extended_base_hash: ExtendedBaseHash,
    // The joint public key $K = \prod_i K_i$ ballots are encrypted to.
    pub joint_public_key: ElGamalPublicKey,
    // The commitments of every guardian from the key ceremony.
    pub guardians: Guardians,
    // Decrypted selections are searched for a vote count of at most this.
    pub max_dlog: u32,
}

impl PublicParameters {
    pub fn new(
        group: GroupContext,
        extended_base_hash: ExtendedBaseHash,
        joint_public_key: ElGamalPublicKey,
        guardians: Guardians,
    ) -> Result<PublicParameters> {
        if guardians.joint_public_key(&group) != joint_public_key
            || !group.is_valid_residue(joint_public_key.key())
        {
            return Err(crate::Error::SanityCheckError(
                SanityCheckError::InvalidParams(),
            ));
        }

        Ok(PublicParameters {
            group,
            extended_base_hash,
            joint_public_key,
            guardians,
            max_dlog: DEFAULT_MAX_DLOG,
        })
    }

    pub fn with_max_dlog(self, max_dlog: u32) -> Self {
        Self { max_dlog, ..self }
    }
}
