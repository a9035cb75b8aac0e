// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

//! Plaintext equivalence proofs: showing that two encrypted ballots hold the same votes, selection
//! by selection, without decrypting either of them.
//!
//! The ratio $(\alpha, \beta)$ of two ciphertexts encrypts the difference of their votes. It is
//! blinded to $(A, B) = (\alpha^\xi, \beta^\xi)$ so that decrypting it to $T$ reveals only whether
//! the difference is zero ($T = 1$), and then decrypted by the trustees as usual.

use std::collections::{BTreeMap, BTreeSet};

use crypto_bigint::rand_core::CryptoRngCore;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ballot::{
        selection_key, DecryptedTallyOrBallot, EncryptedBallot, EncryptedContest,
        EncryptedSelection,
    },
    elgamal::ElGamalCiphertext,
    error::ConfigurationError,
    error_messages::ErrorMessages,
    group::ElementModP,
    proofs::{blinding_challenge, ChaumPedersenProof},
    Decryptor, Error, Result,
};

pub use trusted::{AdminGuardian, BlindChallenge, BlindResponse, BlindingTrustee, PepTrusted};
pub use verifier::VerifierPep;

mod trusted;
mod verifier;

/// The published outcome of comparing two ballots.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct BallotPep {
    pub ballot_id: String,
    /// Whether every selection is equal.
    pub is_equal: bool,
    pub contests: Vec<ContestPep>,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct ContestPep {
    pub contest_id: String,
    pub selections: Vec<SelectionPep>,
}

/// Everything needed to re-verify the comparison of one selection: the blinding proof ties
/// $(A, B)$ to $(\alpha, \beta)$, and the decryption proof ties $T$ to $(A, B)$.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct SelectionPep {
    pub selection_id: String,
    pub is_equal: bool,
    /// $(\alpha, \beta)$
    pub ciphertext_ratio: ElGamalCiphertext,
    /// $(A, B)$
    pub ciphertext_ab: ElGamalCiphertext,
    pub blinding_proof: ChaumPedersenProof,
    pub t: ElementModP,
    pub decryption_proof: ChaumPedersenProof,
}

impl BallotPep {
    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&SelectionPep> {
        self.contests
            .iter()
            .find(|contest| contest.contest_id == contest_id)?
            .selections
            .iter()
            .find(|selection| selection.selection_id == selection_id)
    }
}

/// A blinded ratio ciphertext along with the proof of its blinding.
#[derive(Clone, Debug)]
pub(crate) struct Blinding {
    pub(crate) blinded: ElGamalCiphertext,
    pub(crate) proof: ChaumPedersenProof,
}

/// Builds the ballot whose selections encrypt the difference of the votes of `first` and
/// `second`. Both ballots must hold the same contests and selections, in the same sequence
/// orders. Contest data is not compared.
pub fn make_ratio_ballot(
    first: &EncryptedBallot,
    second: &EncryptedBallot,
) -> Result<EncryptedBallot> {
    let mut reasons = Vec::new();
    repeated_ids("first", first, &mut reasons);
    repeated_ids("second", second, &mut reasons);

    let mut contests = Vec::with_capacity(first.contests.len());

    for contest in &first.contests {
        let Some(other) = second
            .contests
            .iter()
            .find(|other| other.contest_id == contest.contest_id)
        else {
            reasons.push(format!("second ballot is missing contest {}", contest.contest_id));
            continue;
        };

        if contest.sequence_order != other.sequence_order {
            reasons.push(format!(
                "contest {} has sequence orders {} and {}",
                contest.contest_id, contest.sequence_order, other.sequence_order
            ));
        }

        contests.push(ratio_contest(contest, other, &mut reasons));
    }

    reasons.extend(
        second
            .contests
            .iter()
            .filter(|other| {
                !first
                    .contests
                    .iter()
                    .any(|contest| contest.contest_id == other.contest_id)
            })
            .map(|other| format!("first ballot is missing contest {}", other.contest_id)),
    );

    if !reasons.is_empty() {
        warn!(
            first_ballot_id = %first.ballot_id,
            second_ballot_id = %second.ballot_id,
            "ballots cannot be compared"
        );

        return Err(Error::ConfigurationError(
            ConfigurationError::BallotMismatch {
                first_ballot_id: first.ballot_id.clone(),
                second_ballot_id: second.ballot_id.clone(),
                reasons: reasons.join("; "),
            },
        ));
    }

    Ok(EncryptedBallot {
        ballot_id: first.ballot_id.clone(),
        contests,
    })
}

fn repeated_ids(name: &str, ballot: &EncryptedBallot, reasons: &mut Vec<String>) {
    let mut contest_ids = BTreeSet::new();

    for contest in &ballot.contests {
        if !contest_ids.insert(contest.contest_id.as_str()) {
            reasons.push(format!(
                "{name} ballot has contest {} more than once",
                contest.contest_id
            ));
        }

        let mut selection_ids = BTreeSet::new();
        for selection in &contest.selections {
            if !selection_ids.insert(selection.selection_id.as_str()) {
                reasons.push(format!(
                    "{name} ballot has selection {} of contest {} more than once",
                    selection.selection_id, contest.contest_id
                ));
            }
        }
    }
}

fn ratio_contest(
    contest: &EncryptedContest,
    other: &EncryptedContest,
    reasons: &mut Vec<String>,
) -> EncryptedContest {
    let mut selections = Vec::with_capacity(contest.selections.len());

    for selection in &contest.selections {
        match other
            .selections
            .iter()
            .find(|other| other.selection_id == selection.selection_id)
        {
            Some(other) => {
                if selection.sequence_order != other.sequence_order {
                    reasons.push(format!(
                        "selection {} of contest {} has sequence orders {} and {}",
                        selection.selection_id,
                        contest.contest_id,
                        selection.sequence_order,
                        other.sequence_order
                    ));
                }

                selections.push(EncryptedSelection {
                    selection_id: selection.selection_id.clone(),
                    sequence_order: selection.sequence_order,
                    ciphertext: selection.ciphertext.ratio(&other.ciphertext),
                });
            }
            None => reasons.push(format!(
                "second ballot is missing selection {} of contest {}",
                selection.selection_id, contest.contest_id
            )),
        }
    }

    reasons.extend(
        other
            .selections
            .iter()
            .filter(|other| {
                !contest
                    .selections
                    .iter()
                    .any(|selection| selection.selection_id == other.selection_id)
            })
            .map(|other| {
                format!(
                    "first ballot is missing selection {} of contest {}",
                    other.selection_id, contest.contest_id
                )
            }),
    );

    EncryptedContest {
        contest_id: contest.contest_id.clone(),
        sequence_order: contest.sequence_order,
        selections,
        contest_data: None,
    }
}

/// Replaces every selection ciphertext of `ratio_ballot` by its blinding.
pub(crate) fn blinded_ballot(
    ratio_ballot: &EncryptedBallot,
    blindings: &BTreeMap<String, Blinding>,
) -> Result<EncryptedBallot> {
    let contests = ratio_ballot
        .contests
        .iter()
        .map(|contest| -> Result<EncryptedContest> {
            let selections = contest
                .selections
                .iter()
                .map(|selection| -> Result<EncryptedSelection> {
                    let blinding = blindings
                        .get(&selection_key(&contest.contest_id, &selection.selection_id))
                        .ok_or(Error::InternalError)?;

                    Ok(EncryptedSelection {
                        ciphertext: blinding.blinded,
                        ..selection.clone()
                    })
                })
                .collect::<Result<_>>()?;

            Ok(EncryptedContest {
                selections,
                ..contest.clone()
            })
        })
        .collect::<Result<_>>()?;

    Ok(EncryptedBallot {
        ballot_id: ratio_ballot.ballot_id.clone(),
        contests,
    })
}

/// Pairs every ratio ciphertext with its blinding and the decryption of that blinding.
pub(crate) fn assemble_ballot_pep(
    ratio_ballot: &EncryptedBallot,
    blindings: &BTreeMap<String, Blinding>,
    decryption: &DecryptedTallyOrBallot,
) -> Result<BallotPep> {
    let contests: Vec<ContestPep> = ratio_ballot
        .contests
        .iter()
        .map(|contest| -> Result<ContestPep> {
            let selections = contest
                .selections
                .iter()
                .map(|selection| -> Result<SelectionPep> {
                    let blinding = blindings
                        .get(&selection_key(&contest.contest_id, &selection.selection_id))
                        .ok_or(Error::InternalError)?;
                    let decrypted = decryption
                        .selection(&contest.contest_id, &selection.selection_id)
                        .ok_or(Error::InternalError)?;

                    Ok(SelectionPep {
                        selection_id: selection.selection_id.clone(),
                        is_equal: decrypted.b_over_m.is_one(),
                        ciphertext_ratio: selection.ciphertext,
                        ciphertext_ab: blinding.blinded,
                        blinding_proof: blinding.proof,
                        t: decrypted.b_over_m,
                        decryption_proof: decrypted.proof,
                    })
                })
                .collect::<Result<_>>()?;

            Ok(ContestPep {
                contest_id: contest.contest_id.clone(),
                selections,
            })
        })
        .collect::<Result<_>>()?;

    let is_equal = contests
        .iter()
        .flat_map(|contest| &contest.selections)
        .all(|selection| selection.is_equal);

    Ok(BallotPep {
        ballot_id: ratio_ballot.ballot_id.clone(),
        is_equal,
        contests,
    })
}

/// Compares ballots with a single blinding of each ratio, chosen by the party running the
/// comparison, which proves its blinding itself.
pub struct PlaintextEquivalenceProof {
    decryptor: Decryptor,
}

impl PlaintextEquivalenceProof {
    pub fn new(decryptor: Decryptor) -> Self {
        Self { decryptor }
    }

    pub fn decryptor(&self) -> &Decryptor {
        &self.decryptor
    }

    /// Compares `first` and `second` and verifies the result.
    ///
    /// Fails if the ballots cannot be compared or the decryption fails. Proofs that fail to
    /// verify are recorded in `errs`.
    pub fn do_pep(
        &self,
        first: &EncryptedBallot,
        second: &EncryptedBallot,
        rng: &mut impl CryptoRngCore,
        errs: &mut ErrorMessages,
    ) -> Result<BallotPep> {
        let public_parameters = self.decryptor.public_parameters();
        let group = &public_parameters.group;
        let ratio_ballot = make_ratio_ballot(first, second)?;

        let mut blindings = BTreeMap::new();
        for contest in &ratio_ballot.contests {
            for selection in &contest.selections {
                let ratio = &selection.ciphertext;
                let epsilon = group.random_element_mod_q(rng, 2);
                let u = group.random_element_mod_q(rng, 2);

                let blinded = ratio.pow(&epsilon);
                let commitment = ratio.pow(&u);
                let challenge = blinding_challenge(
                    group,
                    &public_parameters.extended_base_hash,
                    &public_parameters.joint_public_key,
                    ratio,
                    &blinded,
                    &commitment.pad,
                    &commitment.data,
                );

                blindings.insert(
                    selection_key(&contest.contest_id, &selection.selection_id),
                    Blinding {
                        blinded,
                        proof: ChaumPedersenProof::new(challenge, u - challenge * epsilon),
                    },
                );
            }
        }

        let decryption = self
            .decryptor
            .decrypt_pep(&blinded_ballot(&ratio_ballot, &blindings)?, errs)?;
        let ballot_pep = assemble_ballot_pep(&ratio_ballot, &blindings, &decryption)?;

        VerifierPep::new(public_parameters).verify_into(&ballot_pep, errs.nested("verification"));
        debug!(
            ballot_id = %ballot_pep.ballot_id,
            is_equal = ballot_pep.is_equal,
            "compared ballots"
        );

        Ok(ballot_pep)
    }

    /// Whether `first` and `second` hold the same votes.
    pub fn test_equivalent(
        &self,
        first: &EncryptedBallot,
        second: &EncryptedBallot,
        rng: &mut impl CryptoRngCore,
        errs: &mut ErrorMessages,
    ) -> Result<bool> {
        self.do_pep(first, second, rng, errs)
            .map(|ballot_pep| ballot_pep.is_equal)
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;
    use rstest::rstest;

    use super::*;
    use crate::test_exports::{encrypt_ballot, test_group, KeyCeremony};

    fn pep(ceremony: &KeyCeremony, present: &[u32]) -> PlaintextEquivalenceProof {
        PlaintextEquivalenceProof::new(
            Decryptor::new(
                ceremony.public_parameters(),
                ceremony.key_share_trustees(present),
            )
            .unwrap(),
        )
    }

    #[test]
    fn ratio_ballot_encrypts_difference() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[3, 1])], None);
        let second = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 1])], None);

        let ratio_ballot = make_ratio_ballot(&first, &second).unwrap();

        let ratio = &ratio_ballot.contests[0].selections[0].ciphertext;
        assert_eq!(
            *ratio,
            first.contests[0].selections[0]
                .ciphertext
                .ratio(&second.contests[0].selections[0].ciphertext)
        );
        assert!(make_ratio_ballot(&first, &first).unwrap().contests[0].selections[1]
            .ciphertext
            .is_one());
    }

    #[rstest]
    #[case::missing_contest(
        &[("contest1", &[1u32][..]), ("contest2", &[1u32][..])][..],
        &[("contest1", &[1u32][..])][..]
    )]
    #[case::extra_contest(
        &[("contest1", &[1u32][..])][..],
        &[("contest1", &[1u32][..]), ("contest2", &[1u32][..])][..]
    )]
    #[case::missing_selection(
        &[("contest1", &[1u32, 0][..])][..],
        &[("contest1", &[1u32][..])][..]
    )]
    #[case::extra_selection(
        &[("contest1", &[1u32][..])][..],
        &[("contest1", &[1u32, 0][..])][..]
    )]
    #[case::duplicate_contest(
        &[("contest1", &[1u32][..]), ("contest1", &[0u32][..])][..],
        &[("contest1", &[1u32][..])][..]
    )]
    fn rejects_mismatched_ballots(
        #[case] first: &[(&str, &[u32])],
        #[case] second: &[(&str, &[u32])],
    ) {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "first", first, None);
        let second = encrypt_ballot(&public_parameters, "second", second, None);

        assert!(matches!(
            make_ratio_ballot(&first, &second),
            Err(Error::ConfigurationError(ConfigurationError::BallotMismatch { .. }))
        ));
    }

    #[test]
    fn rejects_mismatched_sequence_orders() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0])], None);
        let mut second = first.clone();
        second.contests[0].selections[1].sequence_order = 7;

        assert_eq!(
            make_ratio_ballot(&first, &second),
            Err(Error::ConfigurationError(ConfigurationError::BallotMismatch {
                first_ballot_id: "ballot".to_string(),
                second_ballot_id: "ballot".to_string(),
                reasons: "selection selection2 of contest contest1 has sequence orders 2 and 7"
                    .to_string(),
            }))
        );
    }

    #[test]
    fn rejects_repeated_selection_ids() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0])], None);
        let mut second = first.clone();
        second.contests[0].selections[1].selection_id = "selection1".to_string();

        let Err(Error::ConfigurationError(ConfigurationError::BallotMismatch { reasons, .. })) =
            make_ratio_ballot(&first, &second)
        else {
            panic!("repeated selection ids were accepted");
        };
        assert!(reasons
            .contains("second ballot has selection selection1 of contest contest1 more than once"));
    }

    #[test]
    fn compares_selection_by_selection() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(
            &public_parameters,
            "ballot",
            &[("contest1", &[1, 0, 0]), ("contest2", &[0, 1])],
            None,
        );
        let second = encrypt_ballot(
            &public_parameters,
            "ballot",
            &[("contest1", &[0, 1, 0]), ("contest2", &[0, 1])],
            None,
        );

        let pep = pep(&ceremony, &[1, 3]);
        let mut errs = ErrorMessages::new("pep");
        let ballot_pep = pep.do_pep(&first, &second, &mut OsRng, &mut errs).unwrap();

        assert!(!errs.has_errors(), "{errs}");
        assert!(!ballot_pep.is_equal);
        for (contest_id, selection_id, is_equal) in [
            ("contest1", "selection1", false),
            ("contest1", "selection2", false),
            ("contest1", "selection3", true),
            ("contest2", "selection1", true),
            ("contest2", "selection2", true),
        ] {
            let selection = ballot_pep.selection(contest_id, selection_id).unwrap();
            assert_eq!(selection.is_equal, is_equal, "{contest_id} {selection_id}");
            assert_eq!(selection.t.is_one(), is_equal);
        }

        // re-encrypting the same votes
        let reencrypted = encrypt_ballot(
            &public_parameters,
            "ballot",
            &[("contest1", &[1, 0, 0]), ("contest2", &[0, 1])],
            None,
        );
        let mut errs = ErrorMessages::new("pep");
        assert!(pep
            .test_equivalent(&first, &reencrypted, &mut OsRng, &mut errs)
            .unwrap());
        assert!(!errs.has_errors(), "{errs}");
    }

    #[test]
    fn ballot_is_equivalent_to_itself() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let ballot = encrypt_ballot(
            &ceremony.public_parameters(),
            "ballot",
            &[("contest1", &[1, 0]), ("contest2", &[0, 0, 1])],
            Some(b"write-in".as_slice()),
        );

        let mut errs = ErrorMessages::new("pep");
        let ballot_pep = pep(&ceremony, &[2, 3])
            .do_pep(&ballot, &ballot, &mut OsRng, &mut errs)
            .unwrap();

        assert!(!errs.has_errors(), "{errs}");
        assert!(ballot_pep.is_equal);
        assert!(ballot_pep
            .contests
            .iter()
            .flat_map(|contest| &contest.selections)
            .all(|selection| selection.is_equal && selection.ciphertext_ab.is_one()));
    }
}
