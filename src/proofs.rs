// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use merlin::Transcript;

use crate::{
    group::{ElementModP, ElementModQ, GroupContext},
    WideChallengeSizedNumber,
};

pub use chaum_pedersen::ChaumPedersenProof;
pub(crate) use chaum_pedersen::{blinding_challenge, contest_data_challenge, decryption_challenge};

mod chaum_pedersen;

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("proof verification failed")]
pub struct ProofError;

/// Defines a `TranscriptProtocol` trait for using a Merlin transcript.
pub(crate) trait TranscriptProtocol {
    /// Append a group element with the given `label`.
    fn append_element_mod_p(&mut self, label: &'static [u8], element: &ElementModP);

    /// Compute a `label`ed challenge, uniform in $\mathbb{Z}_q$ up to a negligible bias.
    fn challenge_mod_q(&mut self, label: &'static [u8], group: &GroupContext) -> ElementModQ;
}

impl TranscriptProtocol for Transcript {
    fn append_element_mod_p(&mut self, label: &'static [u8], element: &ElementModP) {
        self.append_message(label, &element.to_be_bytes());
    }

    fn challenge_mod_q(&mut self, label: &'static [u8], group: &GroupContext) -> ElementModQ {
        // Draw twice the bits of q so that the reduction is statistically close to uniform.
        let mut buf = [0u8; WideChallengeSizedNumber::BYTES];
        self.challenge_bytes(label, &mut buf);

        group.reduce_wide(WideChallengeSizedNumber::from_le_slice(&buf))
    }
}
