// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::{collections::BTreeMap, sync::Arc};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rand_core::OsRng;
use serde::Serialize;
use tracing::{debug, error};

use super::{
    assemble_ballot_pep, blinded_ballot, make_ratio_ballot, BallotPep, Blinding, VerifierPep,
};
use crate::{
    ballot::{selection_key, EncryptedBallot},
    elgamal::ElGamalCiphertext,
    error::ProtocolError,
    error_messages::ErrorMessages,
    group::{ElementModQ, GroupContext},
    proofs::{blinding_challenge, ChaumPedersenProof},
    Decryptor, Error, Result, SanityCheckError,
};

/// One blinding party's first-round answer for one ratio ciphertext $(\alpha, \beta)$.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct BlindResponse {
    /// $(A_j, B_j) = (\alpha^{\xi_j}, \beta^{\xi_j})$
    pub blinded: ElGamalCiphertext,
    /// $(a_j, b_j) = (\alpha^{u_j}, \beta^{u_j})$
    pub commitment: ElGamalCiphertext,
    /// The blinding exponent $\xi_j$, handed back to the party along with its challenge.
    pub epsilon: ElementModQ,
    /// The commitment nonce $u_j$, handed back to the party along with its challenge.
    pub u: ElementModQ,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct BlindChallenge {
    pub challenge: ElementModQ,
    pub epsilon: ElementModQ,
    pub u: ElementModQ,
}

/// A party that blinds ratio ciphertexts with exponents of its own and proves it did so
/// consistently. Like a [`DecryptingTrustee`](crate::trustee::DecryptingTrustee) it may be
/// remote, and is called once per round with every ciphertext of a ballot.
pub trait BlindingTrustee: Send + Sync {
    fn id(&self) -> &str;

    /// Blinds every ratio, returning one answer per ratio in order.
    fn blind(
        &self,
        group: &GroupContext,
        ratios: &[ElGamalCiphertext],
    ) -> Result<Vec<BlindResponse>>;

    /// Responds $v_j = u_j - c \xi_j$ to every challenge, in order.
    fn challenge(&self, requests: &[BlindChallenge]) -> Result<Vec<ElementModQ>>;
}

/// A blinding party sampling its exponents from the operating system.
#[derive(Clone, Debug)]
pub struct AdminGuardian {
    id: String,
}

impl AdminGuardian {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl BlindingTrustee for AdminGuardian {
    fn id(&self) -> &str {
        &self.id
    }

    fn blind(
        &self,
        group: &GroupContext,
        ratios: &[ElGamalCiphertext],
    ) -> Result<Vec<BlindResponse>> {
        debug!(admin_id = %self.id, ratios = ratios.len(), "blinding");

        Ok(ratios
            .iter()
            .map(|ratio| {
                let epsilon = group.random_element_mod_q(&mut OsRng, 2);
                let u = group.random_element_mod_q(&mut OsRng, 2);

                BlindResponse {
                    blinded: ratio.pow(&epsilon),
                    commitment: ratio.pow(&u),
                    epsilon,
                    u,
                }
            })
            .collect())
    }

    fn challenge(&self, requests: &[BlindChallenge]) -> Result<Vec<ElementModQ>> {
        Ok(requests
            .iter()
            .map(|request| request.u - request.challenge * request.epsilon)
            .collect())
    }
}

/// Compares ballots with the ratios blinded jointly by a set of blinding trustees, each
/// contributing its own exponent, so that no single party chooses the blinding. The party
/// running the comparison is trusted to relay challenges, but every answer is checked.
pub struct PepTrusted {
    decryptor: Decryptor,
    blinding_trustees: Vec<Arc<dyn BlindingTrustee>>,
}

impl PepTrusted {
    pub fn new(
        decryptor: Decryptor,
        blinding_trustees: Vec<Arc<dyn BlindingTrustee>>,
    ) -> Result<Self> {
        if blinding_trustees.is_empty() {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        Ok(Self {
            decryptor,
            blinding_trustees,
        })
    }

    pub fn decryptor(&self) -> &Decryptor {
        &self.decryptor
    }

    pub fn blinding_trustees(&self) -> &[Arc<dyn BlindingTrustee>] {
        &self.blinding_trustees
    }

    /// Compares `first` and `second` and verifies the result.
    ///
    /// Fails if the ballots cannot be compared, a blinding trustee fails or blinds a ratio to
    /// the identity, or the decryption fails. A blinding trustee whose response does not match
    /// its blinding, and any proof that fails to verify, is recorded in `errs`.
    pub fn do_pep(
        &self,
        first: &EncryptedBallot,
        second: &EncryptedBallot,
        errs: &mut ErrorMessages,
    ) -> Result<BallotPep> {
        let public_parameters = self.decryptor.public_parameters();
        let group = &public_parameters.group;
        let ratio_ballot = make_ratio_ballot(first, second)?;

        let (keys, ratios): (Vec<String>, Vec<ElGamalCiphertext>) = ratio_ballot
            .contests
            .iter()
            .flat_map(|contest| {
                contest.selections.iter().map(|selection| {
                    (
                        selection_key(&contest.contest_id, &selection.selection_id),
                        selection.ciphertext,
                    )
                })
            })
            .unzip();

        debug!(ballot_id = %ratio_ballot.ballot_id, ratios = ratios.len(), "blinding round 1");
        let blind_responses = self.blind_responses(group, &ratios)?;

        let mut blindeds = Vec::with_capacity(ratios.len());
        let mut challenges = Vec::with_capacity(ratios.len());
        for (index, (key, ratio)) in keys.iter().zip(&ratios).enumerate() {
            let (blinded, commitment) = blind_responses.iter().fold(
                (one_ciphertext(group), one_ciphertext(group)),
                |(blinded, commitment), responses| {
                    (
                        blinded.add(&responses[index].blinded),
                        commitment.add(&responses[index].commitment),
                    )
                },
            );

            let one = group.one_mod_p();
            if (blinded.pad == one || blinded.data == one) && !ratio.is_one() {
                error!(item_id = %key, "ratio blinded to the identity");
                return Err(Error::ProtocolError(ProtocolError::DegenerateBlinding {
                    item_id: key.clone(),
                }));
            }

            challenges.push(blinding_challenge(
                group,
                &public_parameters.extended_base_hash,
                &public_parameters.joint_public_key,
                ratio,
                &blinded,
                &commitment.pad,
                &commitment.data,
            ));
            blindeds.push(blinded);
        }

        debug!(ballot_id = %ratio_ballot.ballot_id, "blinding round 2");
        let challenge_responses = self.challenge_responses(&blind_responses, &challenges)?;

        let mut blindings = BTreeMap::new();
        for (index, key) in keys.into_iter().enumerate() {
            let (ratio, challenge) = (&ratios[index], &challenges[index]);

            let mut response = group.zero_mod_q();
            for ((trustee, responses), admin_responses) in self
                .blinding_trustees
                .iter()
                .zip(&blind_responses)
                .zip(&challenge_responses)
            {
                let (blind_response, admin_response) = (&responses[index], admin_responses[index]);

                // $a_j = \alpha^{v_j} A_j^c$ and $b_j = \beta^{v_j} B_j^c$
                let expected_commitment = ratio
                    .pow(&admin_response)
                    .add(&blind_response.blinded.pow(challenge));
                if expected_commitment != blind_response.commitment {
                    errs.add(format!(
                        "blinding of {} failed to verify on {key}",
                        trustee.id()
                    ));
                }

                response += admin_response;
            }

            blindings.insert(
                key,
                Blinding {
                    blinded: blindeds[index],
                    proof: ChaumPedersenProof::new(*challenge, response),
                },
            );
        }

        let decryption = self
            .decryptor
            .decrypt_pep(&blinded_ballot(&ratio_ballot, &blindings)?, errs)?;
        let ballot_pep = assemble_ballot_pep(&ratio_ballot, &blindings, &decryption)?;

        VerifierPep::new(public_parameters).verify_into(&ballot_pep, errs.nested("verification"));
        debug!(
            ballot_id = %ballot_pep.ballot_id,
            blinding_trustees = self.blinding_trustees.len(),
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
        errs: &mut ErrorMessages,
    ) -> Result<bool> {
        self.do_pep(first, second, errs)
            .map(|ballot_pep| ballot_pep.is_equal)
    }

    /// Every blinding trustee's answers, in the order of `self.blinding_trustees`.
    fn blind_responses(
        &self,
        group: &GroupContext,
        ratios: &[ElGamalCiphertext],
    ) -> Result<Vec<Vec<BlindResponse>>> {
        #[cfg(not(feature = "parallel"))]
        let iter = self.blinding_trustees.iter();
        #[cfg(feature = "parallel")]
        let iter = self.blinding_trustees.par_iter();

        iter.map(|trustee| -> Result<Vec<BlindResponse>> {
            let responses = trustee.blind(group, ratios).map_err(|e| {
                error!(admin_id = trustee.id(), error = %e, "blinding round 1 failed");
                e
            })?;
            check_len(trustee.as_ref(), ratios.len(), responses.len())?;

            Ok(responses)
        })
        .collect()
    }

    fn challenge_responses(
        &self,
        blind_responses: &[Vec<BlindResponse>],
        challenges: &[ElementModQ],
    ) -> Result<Vec<Vec<ElementModQ>>> {
        #[cfg(not(feature = "parallel"))]
        let iter = self.blinding_trustees.iter().zip(blind_responses);
        #[cfg(feature = "parallel")]
        let iter = self.blinding_trustees.par_iter().zip(blind_responses);

        iter.map(|(trustee, responses)| -> Result<Vec<ElementModQ>> {
            let requests: Vec<BlindChallenge> = responses
                .iter()
                .zip(challenges)
                .map(|(response, challenge)| BlindChallenge {
                    challenge: *challenge,
                    epsilon: response.epsilon,
                    u: response.u,
                })
                .collect();

            let admin_responses = trustee.challenge(&requests).map_err(|e| {
                error!(admin_id = trustee.id(), error = %e, "blinding round 2 failed");
                e
            })?;
            check_len(trustee.as_ref(), requests.len(), admin_responses.len())?;

            Ok(admin_responses)
        })
        .collect()
    }
}

fn check_len(trustee: &dyn BlindingTrustee, expected: usize, received: usize) -> Result<()> {
    if expected == received {
        Ok(())
    } else {
        Err(Error::ProtocolError(ProtocolError::WrongNumberOfResults {
            trustee_id: trustee.id().to_string(),
            expected,
            received,
        }))
    }
}

fn one_ciphertext(group: &GroupContext) -> ElGamalCiphertext {
    ElGamalCiphertext::new(group.one_mod_p(), group.one_mod_p())
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::test_exports::{encrypt_ballot, test_group, KeyCeremony};

    fn admins(ids: &[&str]) -> Vec<Arc<dyn BlindingTrustee>> {
        ids.iter()
            .map(|id| Arc::new(AdminGuardian::new(*id)) as Arc<dyn BlindingTrustee>)
            .collect()
    }

    fn pep_trusted(
        ceremony: &KeyCeremony,
        present: &[u32],
        blinding_trustees: Vec<Arc<dyn BlindingTrustee>>,
    ) -> PepTrusted {
        let decryptor = Decryptor::new_compensating(
            ceremony.public_parameters(),
            ceremony.compensating_trustees(present),
            ceremony.missing_guardians(present),
        )
        .unwrap();

        PepTrusted::new(decryptor, blinding_trustees).unwrap()
    }

    /// Answers its challenges as if it had blinded with $\xi_j + 1$.
    struct LyingAdmin(AdminGuardian);

    impl BlindingTrustee for LyingAdmin {
        fn id(&self) -> &str {
            self.0.id()
        }

        fn blind(
            &self,
            group: &GroupContext,
            ratios: &[ElGamalCiphertext],
        ) -> Result<Vec<BlindResponse>> {
            let mut responses = self.0.blind(group, ratios)?;
            for response in &mut responses {
                response.epsilon = response.epsilon + group.one_mod_q();
            }

            Ok(responses)
        }

        fn challenge(&self, requests: &[BlindChallenge]) -> Result<Vec<ElementModQ>> {
            self.0.challenge(requests)
        }
    }

    /// Blinds with $\xi_j = 0$, or not at all.
    struct ZeroAdmin {
        silent: bool,
    }

    impl BlindingTrustee for ZeroAdmin {
        fn id(&self) -> &str {
            "zero"
        }

        fn blind(
            &self,
            group: &GroupContext,
            ratios: &[ElGamalCiphertext],
        ) -> Result<Vec<BlindResponse>> {
            if self.silent {
                return Ok(vec![]);
            }

            Ok(ratios
                .iter()
                .map(|ratio| {
                    let u = group.random_element_mod_q(&mut OsRng, 2);

                    BlindResponse {
                        blinded: ratio.pow(&group.zero_mod_q()),
                        commitment: ratio.pow(&u),
                        epsilon: group.zero_mod_q(),
                        u,
                    }
                })
                .collect())
        }

        fn challenge(&self, requests: &[BlindChallenge]) -> Result<Vec<ElementModQ>> {
            AdminGuardian::new("zero").challenge(requests)
        }
    }

    #[test]
    fn admins_blind_jointly() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 4, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0, 0])], None);
        let second = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0, 1])], None);
        let reencrypted =
            encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0, 0])], None);

        let pep = pep_trusted(&ceremony, &[1, 4], admins(&["admin1", "admin2", "admin3"]));
        assert_eq!(pep.blinding_trustees().len(), 3);

        let mut errs = ErrorMessages::new("pep");
        let ballot_pep = pep.do_pep(&first, &second, &mut errs).unwrap();
        assert!(!errs.has_errors(), "{errs}");
        assert!(!ballot_pep.is_equal);
        let is_equal: Vec<bool> = ballot_pep.contests[0]
            .selections
            .iter()
            .map(|selection| selection.is_equal)
            .collect();
        assert_eq!(is_equal, vec![true, true, false]);

        let mut errs = ErrorMessages::new("pep");
        assert!(pep.test_equivalent(&first, &reencrypted, &mut errs).unwrap());
        assert!(pep.test_equivalent(&first, &first, &mut errs).unwrap());
        assert!(!errs.has_errors(), "{errs}");
    }

    #[test]
    fn detects_misbehaving_admin() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1])], None);
        let second = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[0])], None);

        let mut blinding_trustees = admins(&["admin1"]);
        blinding_trustees.push(Arc::new(LyingAdmin(AdminGuardian::new("admin2"))));
        let pep = pep_trusted(&ceremony, &[1, 2], blinding_trustees);

        let mut errs = ErrorMessages::new("pep");
        let ballot_pep = pep.do_pep(&first, &second, &mut errs).unwrap();

        assert!(!ballot_pep.is_equal);
        let errors = errs.errors();
        assert!(errors.contains(&(
            "pep".to_string(),
            "blinding of admin2 failed to verify on contest1#@selection1".to_string()
        )));
        assert!(!errors
            .iter()
            .any(|(_, message)| message.starts_with("blinding of admin1")));
        assert!(errors
            .iter()
            .any(|(path, _)| path.starts_with("pep/verification")));
    }

    #[test]
    fn rejects_blinding_to_identity() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0])], None);
        let second = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[0, 0])], None);
        let pep = pep_trusted(
            &ceremony,
            &[1, 2],
            vec![Arc::new(ZeroAdmin { silent: false })],
        );

        assert_eq!(
            pep.do_pep(&first, &second, &mut ErrorMessages::new("pep")),
            Err(Error::ProtocolError(ProtocolError::DegenerateBlinding {
                item_id: "contest1#@selection1".to_string(),
            }))
        );

        // an identical ratio is the identity however it is blinded
        let mut errs = ErrorMessages::new("pep");
        assert!(pep.test_equivalent(&first, &first, &mut errs).unwrap());
        assert!(!errs.has_errors(), "{errs}");
    }

    #[test]
    fn rejects_wrong_number_of_blindings() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let ballot = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0])], None);

        let mut blinding_trustees = admins(&["admin1"]);
        blinding_trustees.push(Arc::new(ZeroAdmin { silent: true }));
        let pep = pep_trusted(&ceremony, &[1, 2], blinding_trustees);

        assert_eq!(
            pep.do_pep(&ballot, &ballot, &mut ErrorMessages::new("pep")),
            Err(Error::ProtocolError(ProtocolError::WrongNumberOfResults {
                trustee_id: "zero".to_string(),
                expected: 2,
                received: 0,
            }))
        );
    }

    #[test]
    fn requires_blinding_trustees() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let decryptor =
            Decryptor::new(ceremony.public_parameters(), ceremony.key_share_trustees(&[1, 2]))
                .unwrap();

        assert!(matches!(
            PepTrusted::new(decryptor, vec![]),
            Err(Error::SanityCheckError(SanityCheckError::InvalidParams()))
        ));
    }
}
