// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use tracing::debug;

use super::{challenge_responses, partial_decryptions, DecryptingTrustee};
use crate::{
    decryptions::{ChallengeRequest, ChallengeResponse, PartialDecryption},
    error::ConfigurationError,
    group::{ElementModP, ElementModQ, GroupContext},
    Error, Result,
};

/// A trustee holding its share $P(x_i) = \sum_j P_j(x_i)$ of the joint secret. It never learns
/// which guardians are missing; the orchestrator applies the Lagrange coefficients instead.
#[derive(Clone, Debug)]
pub struct KeyShareTrustee {
    id: String,
    x_coordinate: u32,
    guardian_public_key: ElementModP,
    key_share: ElementModQ,
}

impl KeyShareTrustee {
    pub fn new(
        id: impl Into<String>,
        x_coordinate: u32,
        guardian_public_key: ElementModP,
        key_share: ElementModQ,
    ) -> Self {
        Self {
            id: id.into(),
            x_coordinate,
            guardian_public_key,
            key_share,
        }
    }
}

impl DecryptingTrustee for KeyShareTrustee {
    fn id(&self) -> &str {
        &self.id
    }

    fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    fn guardian_public_key(&self) -> &ElementModP {
        &self.guardian_public_key
    }

    fn set_missing(
        &self,
        _group: &GroupContext,
        _lagrange_coefficient: &ElementModQ,
        _missing_guardians: &[String],
    ) -> Result<bool> {
        Err(Error::ConfigurationError(
            ConfigurationError::CompensationUnsupported {
                trustee_id: self.id.clone(),
            },
        ))
    }

    fn decrypt(
        &self,
        group: &GroupContext,
        texts: &[ElementModP],
        nonce: Option<ElementModQ>,
    ) -> Result<Vec<PartialDecryption>> {
        debug!(trustee_id = %self.id, texts = texts.len(), "partially decrypting");

        Ok(partial_decryptions(
            group,
            &self.id,
            &self.key_share,
            texts,
            nonce,
        ))
    }

    fn challenge(&self, requests: &[ChallengeRequest]) -> Result<Vec<ChallengeResponse>> {
        Ok(challenge_responses(&self.key_share, requests))
    }
}
