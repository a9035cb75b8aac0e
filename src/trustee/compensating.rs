// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::{
    collections::{BTreeSet, HashMap},
    sync::OnceLock,
};

use crypto_bigint::{rand_core::CryptoRngCore, Encoding};
use serde::Serialize;
use tracing::{debug, error};

use super::{challenge_responses, partial_decryptions, DecryptingTrustee};
use crate::{
    decryptions::{ChallengeRequest, ChallengeResponse, PartialDecryption},
    elgamal::{ElGamalKeypair, ElGamalPublicKey, HashedElGamalCiphertext},
    error::ConfigurationError,
    group::{ElementModP, ElementModQ, GroupContext},
    ElementModQSizedNumber, Error, Result,
};

const KEY_SHARE_DOMAIN: &[u8] = b"guardian key share";

/// The coordinate $P_j(x_i)$ of guardian $j$'s secret polynomial, encrypted by guardian $j$ to
/// the designated guardian $i$ during the key ceremony.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EncryptedKeyShare {
    pub polynomial_owner: String,
    pub designated_guardian_id: String,
    pub encrypted_coordinate: HashedElGamalCiphertext,
}

impl EncryptedKeyShare {
    pub fn encrypt(
        group: &GroupContext,
        polynomial_owner: impl Into<String>,
        designated_guardian_id: impl Into<String>,
        designated_public_key: &ElGamalPublicKey,
        coordinate: &ElementModQ,
        rng: &mut impl CryptoRngCore,
    ) -> Self {
        let polynomial_owner = polynomial_owner.into();
        let designated_guardian_id = designated_guardian_id.into();
        let nonce = group.random_element_mod_q(rng, 1);

        let encrypted_coordinate = HashedElGamalCiphertext::encrypt(
            group,
            &coordinate.value().to_be_bytes(),
            designated_public_key,
            KEY_SHARE_DOMAIN,
            &label(&polynomial_owner, &designated_guardian_id),
            &nonce,
        );

        Self {
            polynomial_owner,
            designated_guardian_id,
            encrypted_coordinate,
        }
    }

    /// Decrypts the coordinate, returning `None` if it does not authenticate under `keypair`.
    pub fn decrypt(&self, group: &GroupContext, keypair: &ElGamalKeypair) -> Option<ElementModQ> {
        let bytes = self.encrypted_coordinate.decrypt(
            keypair,
            KEY_SHARE_DOMAIN,
            &label(&self.polynomial_owner, &self.designated_guardian_id),
        )?;

        if bytes.len() != ElementModQSizedNumber::BYTES {
            return None;
        }

        Some(group.element_mod_q(ElementModQSizedNumber::from_be_slice(&bytes)))
    }
}

fn label(polynomial_owner: &str, designated_guardian_id: &str) -> Vec<u8> {
    format!("{polynomial_owner} to {designated_guardian_id}").into_bytes()
}

#[derive(Clone, Debug)]
struct Compensation {
    missing_guardians: BTreeSet<String>,
    lagrange_coefficient: ElementModQ,
    /// $t_i = s_i + w_i \sum_{j \in \text{missing}} P_j(x_i)$
    exponent: ElementModQ,
}

/// A trustee that compensates for missing guardians itself: once told which guardians are
/// missing, it folds their key shares, weighted by its own Lagrange coefficient, into the
/// exponent it decrypts with. The orchestrator then simply multiplies the partial decryptions.
#[derive(Debug)]
pub struct CompensatingTrustee {
    id: String,
    x_coordinate: u32,
    election_keypair: ElGamalKeypair,
    // Keyed by the guardian whose polynomial the share is a coordinate of.
    key_shares: HashMap<String, EncryptedKeyShare>,
    compensation: OnceLock<Compensation>,
}

impl CompensatingTrustee {
    pub fn new(
        id: impl Into<String>,
        x_coordinate: u32,
        election_keypair: ElGamalKeypair,
        key_shares: Vec<EncryptedKeyShare>,
    ) -> Self {
        Self {
            id: id.into(),
            x_coordinate,
            election_keypair,
            key_shares: key_shares
                .into_iter()
                .map(|key_share| (key_share.polynomial_owner.clone(), key_share))
                .collect(),
            compensation: OnceLock::new(),
        }
    }

    fn compute_compensation(
        &self,
        group: &GroupContext,
        lagrange_coefficient: &ElementModQ,
        missing_guardians: BTreeSet<String>,
    ) -> Result<Compensation> {
        let mut missing_coordinates = group.zero_mod_q();

        for missing_guardian_id in &missing_guardians {
            let key_share = self.key_shares.get(missing_guardian_id).ok_or_else(|| {
                Error::ConfigurationError(ConfigurationError::MissingKeyShare {
                    trustee_id: self.id.clone(),
                    missing_guardian_id: missing_guardian_id.clone(),
                })
            })?;

            let coordinate = key_share
                .decrypt(group, &self.election_keypair)
                .ok_or_else(|| {
                    error!(
                        trustee_id = %self.id,
                        missing_guardian_id = %missing_guardian_id,
                        "key share failed to decrypt"
                    );

                    Error::ConfigurationError(ConfigurationError::UndecryptableKeyShare {
                        trustee_id: self.id.clone(),
                        missing_guardian_id: missing_guardian_id.clone(),
                    })
                })?;

            missing_coordinates += coordinate;
        }

        Ok(Compensation {
            missing_guardians,
            lagrange_coefficient: *lagrange_coefficient,
            exponent: self.election_keypair.secret_key.0
                + *lagrange_coefficient * missing_coordinates,
        })
    }

    fn check_same_configuration(
        &self,
        existing: &Compensation,
        lagrange_coefficient: &ElementModQ,
        missing_guardians: &BTreeSet<String>,
    ) -> Result<bool> {
        if &existing.missing_guardians == missing_guardians
            && &existing.lagrange_coefficient == lagrange_coefficient
        {
            Ok(false)
        } else {
            Err(Error::ConfigurationError(
                ConfigurationError::MissingGuardiansAlreadySet {
                    trustee_id: self.id.clone(),
                },
            ))
        }
    }

    fn exponent(&self) -> Result<ElementModQ> {
        self.compensation
            .get()
            .map(|compensation| compensation.exponent)
            .ok_or_else(|| {
                Error::ConfigurationError(ConfigurationError::TrusteeNotConfigured {
                    trustee_id: self.id.clone(),
                })
            })
    }
}

impl DecryptingTrustee for CompensatingTrustee {
    fn id(&self) -> &str {
        &self.id
    }

    fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    fn guardian_public_key(&self) -> &ElementModP {
        self.election_keypair.public_key.key()
    }

    fn set_missing(
        &self,
        group: &GroupContext,
        lagrange_coefficient: &ElementModQ,
        missing_guardians: &[String],
    ) -> Result<bool> {
        let missing_guardians: BTreeSet<String> = missing_guardians.iter().cloned().collect();

        if let Some(existing) = self.compensation.get() {
            return self.check_same_configuration(existing, lagrange_coefficient, &missing_guardians);
        }

        let compensation =
            self.compute_compensation(group, lagrange_coefficient, missing_guardians.clone())?;

        match self.compensation.set(compensation) {
            Ok(()) => {
                debug!(
                    trustee_id = %self.id,
                    missing = missing_guardians.len(),
                    "configured missing guardians"
                );

                Ok(true)
            }
            // Another caller configured the trustee concurrently.
            Err(_) => {
                let existing = self.compensation.get().ok_or(Error::InternalError)?;

                self.check_same_configuration(existing, lagrange_coefficient, &missing_guardians)
            }
        }
    }

    fn decrypt(
        &self,
        group: &GroupContext,
        texts: &[ElementModP],
        nonce: Option<ElementModQ>,
    ) -> Result<Vec<PartialDecryption>> {
        let exponent = self.exponent()?;
        debug!(trustee_id = %self.id, texts = texts.len(), "partially decrypting");

        Ok(partial_decryptions(group, &self.id, &exponent, texts, nonce))
    }

    fn challenge(&self, requests: &[ChallengeRequest]) -> Result<Vec<ChallengeResponse>> {
        Ok(challenge_responses(&self.exponent()?, requests))
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::test_exports::{guardian_id, test_group, KeyCeremony};

    #[test]
    fn key_shares_decrypt_to_polynomial_coordinates() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let keypair = ceremony.election_keypair(2);

        let coordinate = ceremony.polynomials[0].evaluate(&group.element_mod_q_from_u64(2));
        let key_share = EncryptedKeyShare::encrypt(
            &group,
            guardian_id(1),
            guardian_id(2),
            &keypair.public_key,
            &coordinate,
            &mut OsRng,
        );

        assert_eq!(key_share.decrypt(&group, &keypair), Some(coordinate));
        assert_eq!(
            key_share.decrypt(&group, &ceremony.election_keypair(3)),
            None
        );

        let mut misaddressed = key_share;
        misaddressed.designated_guardian_id = guardian_id(3);
        assert_eq!(misaddressed.decrypt(&group, &keypair), None);
    }

    #[test]
    fn set_missing_is_idempotent() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 4, 2, &mut OsRng);
        let trustee = ceremony.compensating_trustee(1);
        let missing = vec![guardian_id(3), guardian_id(4)];
        let coefficient = group.element_mod_q_from_u64(2);

        assert_eq!(trustee.set_missing(&group, &coefficient, &missing), Ok(true));
        assert_eq!(trustee.set_missing(&group, &coefficient, &missing), Ok(false));

        // order does not matter
        let reordered = vec![guardian_id(4), guardian_id(3)];
        assert_eq!(trustee.set_missing(&group, &coefficient, &reordered), Ok(false));

        assert_eq!(
            trustee.set_missing(&group, &coefficient, &[guardian_id(3)]),
            Err(Error::ConfigurationError(
                ConfigurationError::MissingGuardiansAlreadySet {
                    trustee_id: guardian_id(1)
                }
            ))
        );
        assert_eq!(
            trustee.set_missing(&group, &group.one_mod_q(), &missing),
            Err(Error::ConfigurationError(
                ConfigurationError::MissingGuardiansAlreadySet {
                    trustee_id: guardian_id(1)
                }
            ))
        );
    }

    #[test]
    fn compensates_with_weighted_key_shares() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let trustee = ceremony.compensating_trustee(1);
        let coefficient = group.element_mod_q_from_u64(5);
        let text = group.g_pow_p(&group.random_element_mod_q(&mut OsRng, 1));

        assert!(trustee.set_missing(&group, &coefficient, &[guardian_id(3)]).unwrap());

        let missing_coordinate = ceremony.polynomials[2].evaluate(&group.element_mod_q_from_u64(1));
        let expected_exponent =
            ceremony.polynomials[0].constant_term() + coefficient * missing_coordinate;

        let shares = trustee.decrypt(&group, &[text], None).unwrap();
        assert_eq!(shares[0].m_bar, text.pow(&expected_exponent));
    }

    #[test]
    fn requires_configuration_and_key_shares() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let text = group.g_pow_p(&group.random_element_mod_q(&mut OsRng, 1));

        let trustee = ceremony.compensating_trustee(1);
        assert_eq!(
            trustee.decrypt(&group, &[text], None),
            Err(Error::ConfigurationError(
                ConfigurationError::TrusteeNotConfigured {
                    trustee_id: guardian_id(1)
                }
            ))
        );

        let keypair = ceremony.election_keypair(1);
        let without_shares = CompensatingTrustee::new(guardian_id(1), 1, keypair, vec![]);
        assert_eq!(
            without_shares.set_missing(&group, &group.one_mod_q(), &[guardian_id(2)]),
            Err(Error::ConfigurationError(ConfigurationError::MissingKeyShare {
                trustee_id: guardian_id(1),
                missing_guardian_id: guardian_id(2),
            }))
        );
        // a failed configuration leaves the trustee unconfigured
        assert_eq!(
            without_shares.set_missing(&group, &group.one_mod_q(), &[]),
            Ok(true)
        );
    }
}
