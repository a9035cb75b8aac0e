// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

//! Fixtures for tests and benchmarks: a small Schnorr group, a simulated key ceremony and
//! encrypted tallies and ballots.

use std::sync::Arc;

use crypto_bigint::{rand_core::CryptoRngCore, U512};
use rand_core::OsRng;

use crate::{
    ballot::{EncryptedBallot, EncryptedContest, EncryptedSelection, EncryptedTally},
    elgamal::{ElGamalCiphertext, ElGamalKeypair, HashedElGamalCiphertext},
    group::{ElementModQ, GroupContext},
    guardians::{Guardian, Guardians},
    trustee::{CompensatingTrustee, DecryptingTrustee, EncryptedKeyShare, KeyShareTrustee},
    ElementModPSizedNumber, ElementModQSizedNumber, ExtendedBaseHash, Polynomial,
    PublicParameters,
};

/// $p = 2^{511} + \dots$, with $q \mid p - 1$.
pub fn test_p() -> ElementModPSizedNumber {
    U512::from_be_hex("800000000000000000000000000000000000000000000000000000000000002ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff60f").resize()
}

/// $q = 2^{255} - 19$
pub fn test_q() -> ElementModQSizedNumber {
    ElementModQSizedNumber::from_be_hex(
        "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffed",
    )
}

/// A generator of the order-$q$ subgroup of $\mathbb{Z}_p^*$.
pub fn test_g() -> ElementModPSizedNumber {
    U512::from_be_hex("4c60a647d1e5c3a160d5466805487318978a19a2b9f33cfb01dc573ef2c2a10c681b5c348f8181e9d8a2cda31b667e5992cc11312e4fb527c7d6265671d17058").resize()
}

pub fn test_group() -> GroupContext {
    GroupContext::new(test_p(), test_q(), test_g()).unwrap()
}

pub fn test_extended_base_hash() -> ExtendedBaseHash {
    ExtendedBaseHash::new([0x2a; 32])
}

pub fn guardian_id(x_coordinate: u32) -> String {
    format!("guardian{x_coordinate}")
}

/// A simulated key ceremony among `n` guardians with x-coordinates $1, \dots, n$.
pub struct KeyCeremony {
    pub group: GroupContext,
    pub guardians: Guardians,
    /// The secret polynomial of the guardian at x-coordinate `i + 1`.
    pub polynomials: Vec<Polynomial<ElementModQ>>,
}

impl KeyCeremony {
    pub fn new(
        group: &GroupContext,
        number_of_guardians: u32,
        quorum: u32,
        rng: &mut impl CryptoRngCore,
    ) -> Self {
        let polynomials: Vec<Polynomial<ElementModQ>> = (0..number_of_guardians)
            .map(|_| {
                let secret = group.random_element_mod_q(rng, 2);
                Polynomial::sample_with_constant_term(quorum - 1, secret, || {
                    group.random_element_mod_q(rng, 0)
                })
            })
            .collect();

        let guardians = polynomials
            .iter()
            .zip(1..)
            .map(|(polynomial, x_coordinate)| {
                let commitments = polynomial
                    .coefficients()
                    .iter()
                    .map(|coefficient| group.g_pow_p(coefficient))
                    .collect();

                Guardian::new(guardian_id(x_coordinate), x_coordinate, commitments).unwrap()
            })
            .collect();

        Self {
            group: group.clone(),
            guardians: Guardians::new(guardians).unwrap(),
            polynomials,
        }
    }

    pub fn number_of_guardians(&self) -> u32 {
        self.polynomials.len() as u32
    }

    /// The joint secret $s = \sum_j P_j(0)$.
    pub fn joint_secret(&self) -> ElementModQ {
        self.polynomials
            .iter()
            .fold(self.group.zero_mod_q(), |sum, polynomial| {
                sum + polynomial.constant_term()
            })
    }

    /// $P_j(x)$ for the guardian `j` at x-coordinate `owner`.
    pub fn coordinate(&self, owner: u32, x_coordinate: u32) -> ElementModQ {
        self.polynomials[owner as usize - 1]
            .evaluate(&self.group.element_mod_q_from_u64(u64::from(x_coordinate)))
    }

    /// The key share $P(x) = \sum_j P_j(x)$ of the guardian at `x_coordinate`.
    pub fn key_share(&self, x_coordinate: u32) -> ElementModQ {
        (1..=self.number_of_guardians()).fold(self.group.zero_mod_q(), |sum, owner| {
            sum + self.coordinate(owner, x_coordinate)
        })
    }

    pub fn election_keypair(&self, x_coordinate: u32) -> ElGamalKeypair {
        ElGamalKeypair::from_secret(
            &self.group,
            self.polynomials[x_coordinate as usize - 1].constant_term(),
        )
    }

    pub fn public_parameters(&self) -> PublicParameters {
        PublicParameters::new(
            self.group.clone(),
            test_extended_base_hash(),
            self.guardians.joint_public_key(&self.group),
            self.guardians.clone(),
        )
        .unwrap()
    }

    pub fn key_share_trustee(&self, x_coordinate: u32) -> KeyShareTrustee {
        KeyShareTrustee::new(
            guardian_id(x_coordinate),
            x_coordinate,
            *self.election_keypair(x_coordinate).public_key.key(),
            self.key_share(x_coordinate),
        )
    }

    /// A compensating trustee holding a key share from every other guardian, except those at
    /// `without`.
    pub fn compensating_trustee_without_shares(
        &self,
        x_coordinate: u32,
        without: &[u32],
    ) -> CompensatingTrustee {
        let keypair = self.election_keypair(x_coordinate);
        let key_shares = (1..=self.number_of_guardians())
            .filter(|owner| *owner != x_coordinate && !without.contains(owner))
            .map(|owner| {
                EncryptedKeyShare::encrypt(
                    &self.group,
                    guardian_id(owner),
                    guardian_id(x_coordinate),
                    &keypair.public_key,
                    &self.coordinate(owner, x_coordinate),
                    &mut OsRng,
                )
            })
            .collect();

        CompensatingTrustee::new(guardian_id(x_coordinate), x_coordinate, keypair, key_shares)
    }

    pub fn compensating_trustee_without_share(
        &self,
        x_coordinate: u32,
        without: u32,
    ) -> CompensatingTrustee {
        self.compensating_trustee_without_shares(x_coordinate, &[without])
    }

    pub fn compensating_trustee(&self, x_coordinate: u32) -> CompensatingTrustee {
        self.compensating_trustee_without_shares(x_coordinate, &[])
    }

    pub fn key_share_trustees(&self, present: &[u32]) -> Vec<Arc<dyn DecryptingTrustee>> {
        present
            .iter()
            .map(|x| Arc::new(self.key_share_trustee(*x)) as Arc<dyn DecryptingTrustee>)
            .collect()
    }

    pub fn compensating_trustees(&self, present: &[u32]) -> Vec<Arc<dyn DecryptingTrustee>> {
        present
            .iter()
            .map(|x| Arc::new(self.compensating_trustee(*x)) as Arc<dyn DecryptingTrustee>)
            .collect()
    }

    /// The ids of the guardians not in `present`, in x-coordinate order.
    pub fn missing_guardians(&self, present: &[u32]) -> Vec<String> {
        (1..=self.number_of_guardians())
            .filter(|x| !present.contains(x))
            .map(guardian_id)
            .collect()
    }
}

/// Encrypts each contest's `votes` to selections `selection1`, `selection2`, ... in order.
pub fn encrypt_contests(
    public_parameters: &PublicParameters,
    contests: &[(&str, &[u32])],
    contest_data: Option<&[u8]>,
) -> Vec<EncryptedContest> {
    let group = &public_parameters.group;

    contests
        .iter()
        .zip(1..)
        .map(|((contest_id, votes), contest_sequence_order)| {
            let selections = votes
                .iter()
                .zip(1..)
                .map(|(vote, sequence_order)| EncryptedSelection {
                    selection_id: format!("selection{sequence_order}"),
                    sequence_order,
                    ciphertext: ElGamalCiphertext::encrypt(
                        group,
                        *vote,
                        &public_parameters.joint_public_key,
                        &group.random_element_mod_q(&mut OsRng, 1),
                    ),
                })
                .collect();

            let contest_data = contest_data.map(|contest_data| {
                HashedElGamalCiphertext::encrypt(
                    group,
                    contest_data,
                    &public_parameters.joint_public_key,
                    public_parameters.extended_base_hash.as_bytes(),
                    contest_id.as_bytes(),
                    &group.random_element_mod_q(&mut OsRng, 1),
                )
            });

            EncryptedContest {
                contest_id: contest_id.to_string(),
                sequence_order: contest_sequence_order,
                selections,
                contest_data,
            }
        })
        .collect()
}

pub fn encrypt_tally(
    public_parameters: &PublicParameters,
    tally_id: &str,
    contests: &[(&str, &[u32])],
) -> EncryptedTally {
    EncryptedTally {
        tally_id: tally_id.to_string(),
        contests: encrypt_contests(public_parameters, contests, None),
    }
}

pub fn encrypt_ballot(
    public_parameters: &PublicParameters,
    ballot_id: &str,
    contests: &[(&str, &[u32])],
    contest_data: Option<&[u8]>,
) -> EncryptedBallot {
    EncryptedBallot {
        ballot_id: ballot_id.to_string(),
        contests: encrypt_contests(public_parameters, contests, contest_data),
    }
}
