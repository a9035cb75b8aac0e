// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use serde::Serialize;

use crate::{
    elgamal::{ElGamalCiphertext, HashedElGamalCiphertext},
    group::ElementModP,
    proofs::ChaumPedersenProof,
};

/// The key a selection's decryption is tracked under across trustees.
pub(crate) fn selection_key(contest_id: &str, selection_id: &str) -> String {
    format!("{contest_id}#@{selection_id}")
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EncryptedSelection {
    pub selection_id: String,
    pub sequence_order: u32,
    pub ciphertext: ElGamalCiphertext,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EncryptedContest {
    pub contest_id: String,
    pub sequence_order: u32,
    pub selections: Vec<EncryptedSelection>,
    /// Present on cast ballots only; tallies carry no contest data.
    pub contest_data: Option<HashedElGamalCiphertext>,
}

/// The homomorphic accumulation of all cast ballots.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EncryptedTally {
    pub tally_id: String,
    pub contests: Vec<EncryptedContest>,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EncryptedBallot {
    pub ballot_id: String,
    pub contests: Vec<EncryptedContest>,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct DecryptedSelection {
    pub selection_id: String,
    /// The decrypted vote count. `None` only for plaintext-equivalence decryptions, which never
    /// take the discrete log.
    pub tally: Option<u32>,
    /// $T = B / M = K^t$.
    pub b_over_m: ElementModP,
    pub ciphertext: ElGamalCiphertext,
    pub proof: ChaumPedersenProof,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct DecryptedContestData {
    pub contest_data: Vec<u8>,
    pub ciphertext: HashedElGamalCiphertext,
    pub proof: ChaumPedersenProof,
    pub beta: ElementModP,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct DecryptedContest {
    pub contest_id: String,
    pub selections: Vec<DecryptedSelection>,
    pub contest_data: Option<DecryptedContestData>,
}

/// A decrypted tally or ballot, with a proof of correct decryption for every selection and for
/// every contest's data.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct DecryptedTallyOrBallot {
    pub id: String,
    pub contests: Vec<DecryptedContest>,
}

impl DecryptedTallyOrBallot {
    pub fn contest(&self, contest_id: &str) -> Option<&DecryptedContest> {
        self.contests
            .iter()
            .find(|contest| contest.contest_id == contest_id)
    }

    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&DecryptedSelection> {
        self.contest(contest_id)?
            .selections
            .iter()
            .find(|selection| selection.selection_id == selection_id)
    }

    pub fn tally(&self, contest_id: &str, selection_id: &str) -> Option<u32> {
        self.selection(contest_id, selection_id)?.tally
    }
}
