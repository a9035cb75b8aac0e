// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    ballot::{
        selection_key, DecryptedContest, DecryptedContestData, DecryptedSelection,
        DecryptedTallyOrBallot, EncryptedContest, EncryptedSelection,
    },
    decryptions::{Decryptions, PartialDecryption},
    decryptor::DecryptionMode,
    elgamal::HashedElGamalCiphertext,
    error_messages::ErrorMessages,
    group::{ElementModP, ElementModQ, GroupContext},
    proofs::ChaumPedersenProof,
    Error, PublicParameters, Result,
};

/// What a trustee's proof of partial decryption is verified against.
///
/// A trustee decrypting with exponent $e_i$ proves $\bar{M}_i = A^{e_i}$ for $g^{e_i}$ =
/// `public_key`, answering the collective challenge scaled by `challenge_weight`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GuardianVerificationKey {
    pub(crate) public_key: ElementModP,
    pub(crate) challenge_weight: ElementModQ,
}

/// Turns the record of both decryption rounds into a decrypted tally or ballot, verifying every
/// collective proof and every trustee's partial decryption along the way.
///
/// Failed verifications do not abort; they are recorded in the caller's [`ErrorMessages`].
#[derive(Clone, Debug)]
pub(crate) struct TallyDecryptor {
    verification_keys: BTreeMap<String, GuardianVerificationKey>,
}

impl TallyDecryptor {
    pub(crate) fn new(verification_keys: BTreeMap<String, GuardianVerificationKey>) -> Self {
        Self { verification_keys }
    }

    pub(crate) fn decrypt(
        &self,
        public_parameters: &PublicParameters,
        id: &str,
        contests: &[EncryptedContest],
        mode: DecryptionMode,
        decryptions: &Decryptions,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedTallyOrBallot> {
        let mut decrypted_contests = Vec::with_capacity(contests.len());

        for contest in contests {
            let contest_errs = errs.nested(format!("contest {}", contest.contest_id));

            let mut selections = Vec::with_capacity(contest.selections.len());
            for selection in &contest.selections {
                selections.push(self.decrypt_selection(
                    public_parameters,
                    &contest.contest_id,
                    selection,
                    decryptions,
                    contest_errs.nested(format!("selection {}", selection.selection_id)),
                )?);
            }

            let contest_data = match (&contest.contest_data, mode) {
                (Some(ciphertext), DecryptionMode::Ballot) => self.decrypt_contest_data(
                    public_parameters,
                    &contest.contest_id,
                    ciphertext,
                    decryptions,
                    contest_errs.nested("contest data"),
                )?,
                _ => None,
            };

            decrypted_contests.push(DecryptedContest {
                contest_id: contest.contest_id.clone(),
                selections,
                contest_data,
            });
        }

        debug!(id, contests = decrypted_contests.len(), "decrypted");

        Ok(DecryptedTallyOrBallot {
            id: id.to_string(),
            contests: decrypted_contests,
        })
    }

    fn decrypt_selection(
        &self,
        public_parameters: &PublicParameters,
        contest_id: &str,
        selection: &EncryptedSelection,
        decryptions: &Decryptions,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedSelection> {
        let group = &public_parameters.group;
        let decryption = decryptions
            .selections
            .get(&selection_key(contest_id, &selection.selection_id))
            .ok_or(Error::InternalError)?;

        let proof = ChaumPedersenProof::new(
            decryption.challenge,
            group.sum(decryption.responses.values()),
        );
        let b_over_m = decryption.ciphertext.data / decryption.m;

        self.verify_partial_decryptions(
            group,
            &decryption.ciphertext.pad,
            &decryption.shares,
            &decryption.responses,
            &decryption.challenge,
            errs,
        );

        if proof
            .verify_decryption(
                group,
                &public_parameters.extended_base_hash,
                &public_parameters.joint_public_key,
                &decryption.ciphertext,
                &b_over_m,
            )
            .is_err()
        {
            errs.add("collective decryption proof failed to verify");
        }

        Ok(DecryptedSelection {
            selection_id: selection.selection_id.clone(),
            tally: decryption.tally,
            b_over_m,
            ciphertext: decryption.ciphertext,
            proof,
        })
    }

    fn decrypt_contest_data(
        &self,
        public_parameters: &PublicParameters,
        contest_id: &str,
        ciphertext: &HashedElGamalCiphertext,
        decryptions: &Decryptions,
        errs: &mut ErrorMessages,
    ) -> Result<Option<DecryptedContestData>> {
        let group = &public_parameters.group;
        let decryption = decryptions
            .contest_data
            .get(contest_id)
            .ok_or(Error::InternalError)?;

        let proof = ChaumPedersenProof::new(
            decryption.challenge,
            group.sum(decryption.responses.values()),
        );

        self.verify_partial_decryptions(
            group,
            &ciphertext.c0,
            &decryption.shares,
            &decryption.responses,
            &decryption.challenge,
            errs,
        );

        if proof
            .verify_contest_data(
                group,
                &public_parameters.extended_base_hash,
                &public_parameters.joint_public_key,
                ciphertext,
                &decryption.beta,
            )
            .is_err()
        {
            errs.add("collective contest data proof failed to verify");
        }

        let contest_data = ciphertext.decrypt_with_beta(
            &public_parameters.joint_public_key,
            public_parameters.extended_base_hash.as_bytes(),
            contest_id.as_bytes(),
            &decryption.beta,
        );

        match contest_data {
            Some(contest_data) => Ok(Some(DecryptedContestData {
                contest_data,
                ciphertext: ciphertext.clone(),
                proof,
                beta: decryption.beta,
            })),
            None => {
                errs.add("contest data failed authentication");

                Ok(None)
            }
        }
    }

    /// Checks each trustee's response against its own commitment:
    /// $a_i = g^{v_i} (g^{e_i})^{w c}$ and $b_i = A^{v_i} \bar{M}_i^{w c}$.
    fn verify_partial_decryptions(
        &self,
        group: &GroupContext,
        pad: &ElementModP,
        shares: &BTreeMap<String, PartialDecryption>,
        responses: &BTreeMap<String, ElementModQ>,
        challenge: &ElementModQ,
        errs: &mut ErrorMessages,
    ) {
        for (trustee_id, share) in shares {
            let Some(verification_key) = self.verification_keys.get(trustee_id) else {
                errs.add(format!("trustee {trustee_id} has no verification key"));
                continue;
            };
            let Some(response) = responses.get(trustee_id) else {
                errs.add(format!("trustee {trustee_id} did not respond"));
                continue;
            };

            let weighted_challenge = verification_key.challenge_weight * challenge;
            let a = group.g_pow_p(response) * verification_key.public_key.pow(&weighted_challenge);
            let b = pad.pow(response) * share.m_bar.pow(&weighted_challenge);

            if a != share.a || b != share.b {
                errs.add(format!(
                    "partial decryption of trustee {trustee_id} failed to verify"
                ));
            }
        }
    }
}
