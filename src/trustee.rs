// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use rand_core::OsRng;

use crate::{
    decryptions::{ChallengeRequest, ChallengeResponse, PartialDecryption},
    group::{ElementModP, ElementModQ, GroupContext},
    Result,
};

pub use compensating::{CompensatingTrustee, EncryptedKeyShare};
pub use key_share::KeyShareTrustee;

mod compensating;
mod key_share;

/// A guardian taking part in a decryption. The orchestrator only ever talks to guardians through
/// this trait; the secret a trustee decrypts with never leaves it.
///
/// Decryption runs in two rounds: [`Self::decrypt`] returns a partial decryption of each text
/// together with a commitment, and [`Self::challenge`] answers the collective challenges for
/// those commitments.
pub trait DecryptingTrustee: Send + Sync {
    fn id(&self) -> &str;

    fn x_coordinate(&self) -> u32;

    /// The guardian's public key $K_i = g^{s_i}$ from the key ceremony.
    fn guardian_public_key(&self) -> &ElementModP;

    /// Configures the trustee to compensate for `missing_guardians` with its Lagrange coefficient
    /// over the present set.
    ///
    /// Returns `Ok(true)` if this configured the trustee, and `Ok(false)` if it was already
    /// configured identically. Reconfiguring with different values is an error.
    fn set_missing(
        &self,
        group: &GroupContext,
        lagrange_coefficient: &ElementModQ,
        missing_guardians: &[String],
    ) -> Result<bool>;

    /// Computes a partial decryption of each of `texts`. The commitment nonce is sampled for
    /// each text unless `nonce` is given.
    fn decrypt(
        &self,
        group: &GroupContext,
        texts: &[ElementModP],
        nonce: Option<ElementModQ>,
    ) -> Result<Vec<PartialDecryption>>;

    /// Computes the response $v_i = u_i - c_i e_i$ to each request.
    fn challenge(&self, requests: &[ChallengeRequest]) -> Result<Vec<ChallengeResponse>>;
}

pub(crate) fn partial_decryptions(
    group: &GroupContext,
    guardian_id: &str,
    exponent: &ElementModQ,
    texts: &[ElementModP],
    nonce: Option<ElementModQ>,
) -> Vec<PartialDecryption> {
    texts
        .iter()
        .map(|text| {
            let u = nonce.unwrap_or_else(|| group.random_element_mod_q(&mut OsRng, 2));

            PartialDecryption {
                guardian_id: guardian_id.to_string(),
                m_bar: text.pow(exponent),
                u,
                a: group.g_pow_p(&u),
                b: text.pow(&u),
            }
        })
        .collect()
}

pub(crate) fn challenge_responses(
    exponent: &ElementModQ,
    requests: &[ChallengeRequest],
) -> Vec<ChallengeResponse> {
    requests
        .iter()
        .map(|request| ChallengeResponse {
            id: request.id.clone(),
            response: request.nonce - request.challenge * exponent,
        })
        .collect()
}
