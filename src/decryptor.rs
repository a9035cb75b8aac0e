// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error};

use crate::{
    ballot::{
        selection_key, DecryptedTallyOrBallot, EncryptedBallot, EncryptedContest, EncryptedTally,
    },
    decryptions::{
        ChallengeRequest, Decryptions, DecryptionsBuilder, PartialDecryption,
        TrusteeChallengeResponses, TrusteeDecryptions,
    },
    error::{ConfigurationError, ProtocolError},
    error_messages::ErrorMessages,
    group::{ElementModP, ElementModQ, GroupContext},
    lagrange::{lagrange_coordinates, LagrangeCoordinate},
    proofs::{contest_data_challenge, decryption_challenge},
    tally_decryptor::{GuardianVerificationKey, TallyDecryptor},
    trustee::DecryptingTrustee,
    Error, Result,
};

pub mod public_parameters;

use public_parameters::PublicParameters;

/// How the orchestrator combines the partial decryptions $\bar{M}_i$ of the present trustees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShareCombination {
    /// Trustees decrypt with their unweighted key shares $P(x_i)$, and the orchestrator
    /// interpolates: $M = \prod_i \bar{M}_i^{w_i}$.
    LagrangeWeighted,
    /// Trustees already folded their Lagrange coefficient into the exponent they decrypt with,
    /// compensating for the missing guardians themselves: $M = \prod_i \bar{M}_i$.
    PreWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecryptionMode {
    Tally,
    Ballot,
    /// Like `Ballot`, but skips the discrete log and contest data.
    Pep,
}

/// What a text sent to the trustees in the first round is the pad of.
#[derive(Debug, Clone)]
enum Target {
    Selection(String),
    ContestData(String),
}

/// Drives the two-round threshold decryption of tallies and ballots with a fixed set of present
/// trustees.
///
/// The present set is fixed at construction: the Lagrange coefficients, and for compensating
/// trustees the missing guardians they compensate for, are derived from it once. Every item
/// decrypted must then carry a share from exactly these trustees.
pub struct Decryptor {
    public_parameters: PublicParameters,
    trustees: Vec<Arc<dyn DecryptingTrustee>>,
    combination: ShareCombination,
    lagrange_coordinates: BTreeMap<String, LagrangeCoordinate>,
    present: BTreeSet<String>,
    missing_guardians: Vec<String>,
    tally_decryptor: TallyDecryptor,
}

impl Decryptor {
    /// Creates a decryptor for key-share trustees, weighting their partial decryptions by their
    /// Lagrange coefficients. Any guardian without a trustee is missing.
    pub fn new(
        public_parameters: PublicParameters,
        trustees: Vec<Arc<dyn DecryptingTrustee>>,
    ) -> Result<Self> {
        let present = check_trustees(&public_parameters, &trustees)?;
        let missing_guardians = public_parameters
            .guardians
            .iter()
            .map(|guardian| guardian.id().to_string())
            .filter(|guardian_id| !present.contains(guardian_id))
            .collect();

        Self::configure(
            public_parameters,
            trustees,
            present,
            missing_guardians,
            ShareCombination::LagrangeWeighted,
        )
    }

    /// Creates a decryptor for compensating trustees, configuring each of them to compensate for
    /// `missing_guardians`, which together with the trustees must make up all guardians.
    pub fn new_compensating(
        public_parameters: PublicParameters,
        trustees: Vec<Arc<dyn DecryptingTrustee>>,
        missing_guardians: Vec<String>,
    ) -> Result<Self> {
        let present = check_trustees(&public_parameters, &trustees)?;

        let unique_missing: BTreeSet<&String> = missing_guardians.iter().collect();
        let complements_present = unique_missing.len() == missing_guardians.len()
            && unique_missing.iter().all(|guardian_id| {
                !present.contains(*guardian_id)
                    && public_parameters.guardians.get(guardian_id).is_some()
            })
            && present.len() + unique_missing.len() == public_parameters.guardians.len();

        if !complements_present {
            return Err(Error::ConfigurationError(
                ConfigurationError::PresentSetMismatch {
                    missing: missing_guardians,
                },
            ));
        }

        Self::configure(
            public_parameters,
            trustees,
            present,
            missing_guardians,
            ShareCombination::PreWeighted,
        )
    }

    fn configure(
        public_parameters: PublicParameters,
        trustees: Vec<Arc<dyn DecryptingTrustee>>,
        present: BTreeSet<String>,
        missing_guardians: Vec<String>,
        combination: ShareCombination,
    ) -> Result<Self> {
        let group = &public_parameters.group;

        let lagrange_coordinates: BTreeMap<String, LagrangeCoordinate> = lagrange_coordinates(
            group,
            trustees
                .iter()
                .map(|trustee| (trustee.id(), trustee.x_coordinate())),
        )?
        .into_iter()
        .map(|coordinate| (coordinate.guardian_id.clone(), coordinate))
        .collect();

        let mut verification_keys = BTreeMap::new();
        for trustee in &trustees {
            let coordinate = lagrange_coordinates
                .get(trustee.id())
                .ok_or(Error::InternalError)?;

            let verification_key = match combination {
                ShareCombination::LagrangeWeighted => GuardianVerificationKey {
                    public_key: public_parameters
                        .guardians
                        .g_exp_p(group, coordinate.x_coordinate),
                    challenge_weight: coordinate.coefficient,
                },
                ShareCombination::PreWeighted => {
                    trustee.set_missing(group, &coordinate.coefficient, &missing_guardians)?;

                    GuardianVerificationKey {
                        public_key: compensated_public_key(
                            &public_parameters,
                            trustee.guardian_public_key(),
                            coordinate,
                            &missing_guardians,
                        )?,
                        challenge_weight: group.one_mod_q(),
                    }
                }
            };

            verification_keys.insert(trustee.id().to_string(), verification_key);
        }

        debug!(
            present = present.len(),
            missing = missing_guardians.len(),
            ?combination,
            "configured decryptor"
        );

        Ok(Self {
            public_parameters,
            trustees,
            combination,
            lagrange_coordinates,
            present,
            missing_guardians,
            tally_decryptor: TallyDecryptor::new(verification_keys),
        })
    }

    pub fn public_parameters(&self) -> &PublicParameters {
        &self.public_parameters
    }

    pub fn combination(&self) -> ShareCombination {
        self.combination
    }

    /// The Lagrange coordinate of every present trustee, keyed by its id.
    pub fn lagrange_coordinates(&self) -> &BTreeMap<String, LagrangeCoordinate> {
        &self.lagrange_coordinates
    }

    pub fn missing_guardians(&self) -> &[String] {
        &self.missing_guardians
    }

    /// Decrypts every selection of `tally` to its vote count.
    ///
    /// Fails if a trustee fails or misbehaves in either round, or if a count exceeds
    /// `max_dlog`. Proofs that fail to verify are instead recorded in `errs`, in which case the
    /// returned tally must not be trusted.
    pub fn decrypt_tally(
        &self,
        tally: &EncryptedTally,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedTallyOrBallot> {
        self.decrypt(&tally.tally_id, &tally.contests, DecryptionMode::Tally, errs)
    }

    /// Decrypts every selection of `ballot`, along with the contest data of each contest.
    pub fn decrypt_ballot(
        &self,
        ballot: &EncryptedBallot,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedTallyOrBallot> {
        self.decrypt(
            &ballot.ballot_id,
            &ballot.contests,
            DecryptionMode::Ballot,
            errs,
        )
    }

    /// Decrypts every selection of `ballot` to the group element $T$, without taking its
    /// discrete log. Contest data is ignored.
    pub fn decrypt_pep(
        &self,
        ballot: &EncryptedBallot,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedTallyOrBallot> {
        self.decrypt(&ballot.ballot_id, &ballot.contests, DecryptionMode::Pep, errs)
    }

    pub(crate) fn decrypt(
        &self,
        id: &str,
        contests: &[EncryptedContest],
        mode: DecryptionMode,
        errs: &mut ErrorMessages,
    ) -> Result<DecryptedTallyOrBallot> {
        let decryptions = self.decryptions(id, contests, mode)?;

        self.tally_decryptor.decrypt(
            &self.public_parameters,
            id,
            contests,
            mode,
            &decryptions,
            errs,
        )
    }

    /// Runs both rounds of the protocol with the trustees and returns the record of every
    /// share, challenge and response, unverified.
    pub(crate) fn decryptions(
        &self,
        id: &str,
        contests: &[EncryptedContest],
        mode: DecryptionMode,
    ) -> Result<Decryptions> {
        let (mut builder, targets, texts) = prepare(contests, mode)?;

        debug!(id, texts = texts.len(), trustees = self.trustees.len(), "round 1");
        for trustee_decryptions in self.partial_decryptions(&targets, &texts)? {
            builder.add_trustee_decryptions(trustee_decryptions)?;
        }
        builder.check_shares(&self.present)?;

        self.combine_shares(&mut builder, mode)?;

        debug!(id, "round 2");
        for responses in self.challenge_responses(&builder)? {
            builder.add_challenge_responses(responses)?;
        }

        builder.finalize(&self.present)
    }

    fn partial_decryptions(
        &self,
        targets: &[Target],
        texts: &[ElementModP],
    ) -> Result<Vec<TrusteeDecryptions>> {
        let group = &self.public_parameters.group;

        #[cfg(not(feature = "parallel"))]
        let iter = self.trustees.iter();
        #[cfg(feature = "parallel")]
        let iter = self.trustees.par_iter();

        iter.map(|trustee| -> Result<TrusteeDecryptions> {
            let shares = trustee.decrypt(group, texts, None).map_err(|e| {
                error!(trustee_id = trustee.id(), error = %e, "round 1 failed");
                e
            })?;

            if shares.len() != texts.len() {
                return Err(Error::ProtocolError(ProtocolError::WrongNumberOfResults {
                    trustee_id: trustee.id().to_string(),
                    expected: texts.len(),
                    received: shares.len(),
                }));
            }

            let mut decryptions = TrusteeDecryptions::new(trustee.id());
            for (target, share) in targets.iter().zip(shares) {
                match target {
                    Target::Selection(key) => decryptions.selections.insert(key.clone(), share),
                    Target::ContestData(contest_id) => {
                        decryptions.contest_data.insert(contest_id.clone(), share)
                    }
                };
            }

            Ok(decryptions)
        })
        .collect()
    }

    /// Combines the shares of each item, computes its tally unless decrypting for a PEP, and
    /// its collective challenge.
    fn combine_shares(&self, builder: &mut DecryptionsBuilder, mode: DecryptionMode) -> Result<()> {
        let PublicParameters {
            group,
            extended_base_hash,
            joint_public_key,
            max_dlog,
            ..
        } = &self.public_parameters;

        for (key, results) in builder.selections.iter_mut() {
            let (m, a, b) = self.combine(group, &results.shares)?;

            if mode != DecryptionMode::Pep {
                let t = results.ciphertext.data / m;
                let tally = joint_public_key.dlog(group, &t, *max_dlog).ok_or_else(|| {
                    error!(item_id = %key, max_dlog, "discrete log bound exceeded");

                    Error::DiscreteLogBoundExceeded {
                        item_id: key.clone(),
                        max_dlog: *max_dlog,
                    }
                })?;
                results.tally = Some(tally);
            }

            results.challenge = Some(decryption_challenge(
                group,
                extended_base_hash,
                joint_public_key,
                &results.ciphertext,
                &a,
                &b,
                &m,
            ));
            results.m = Some(m);
        }

        for results in builder.contest_data.values_mut() {
            let (beta, a, b) = self.combine(group, &results.shares)?;

            results.challenge = Some(contest_data_challenge(
                group,
                extended_base_hash,
                joint_public_key,
                &results.ciphertext,
                &a,
                &b,
                &beta,
            ));
            results.beta = Some(beta);
        }

        Ok(())
    }

    /// Computes the combined share along with the products $\prod_i a_i$ and $\prod_i b_i$ of
    /// the commitments.
    fn combine(
        &self,
        group: &GroupContext,
        shares: &BTreeMap<String, PartialDecryption>,
    ) -> Result<(ElementModP, ElementModP, ElementModP)> {
        let mut combined = group.one_mod_p();
        for (trustee_id, share) in shares {
            combined *= match self.combination {
                ShareCombination::LagrangeWeighted => {
                    share.m_bar.pow(&self.weight(trustee_id)?)
                }
                ShareCombination::PreWeighted => share.m_bar,
            };
        }

        Ok((
            combined,
            group.product(shares.values().map(|share| &share.a)),
            group.product(shares.values().map(|share| &share.b)),
        ))
    }

    fn weight(&self, trustee_id: &str) -> Result<ElementModQ> {
        self.lagrange_coordinates
            .get(trustee_id)
            .map(|coordinate| coordinate.coefficient)
            .ok_or(Error::InternalError)
    }

    fn challenge_responses(
        &self,
        builder: &DecryptionsBuilder,
    ) -> Result<Vec<TrusteeChallengeResponses>> {
        let requests: Vec<(Arc<dyn DecryptingTrustee>, Vec<ChallengeRequest>)> = self
            .trustees
            .iter()
            .map(|trustee| -> Result<_> {
                let weight = match self.combination {
                    ShareCombination::LagrangeWeighted => self.weight(trustee.id())?,
                    ShareCombination::PreWeighted => self.public_parameters.group.one_mod_q(),
                };

                Ok((
                    trustee.clone(),
                    builder.challenge_requests(trustee.id(), &weight)?,
                ))
            })
            .collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let iter = requests.iter();
        #[cfg(feature = "parallel")]
        let iter = requests.par_iter();

        iter.map(|(trustee, requests)| -> Result<TrusteeChallengeResponses> {
            let responses = trustee.challenge(requests).map_err(|e| {
                error!(trustee_id = trustee.id(), error = %e, "round 2 failed");
                e
            })?;

            if responses.len() != requests.len() {
                return Err(Error::ProtocolError(ProtocolError::WrongNumberOfResults {
                    trustee_id: trustee.id().to_string(),
                    expected: requests.len(),
                    received: responses.len(),
                }));
            }

            Ok(TrusteeChallengeResponses {
                trustee_id: trustee.id().to_string(),
                responses,
            })
        })
        .collect()
    }
}

/// Checks every trustee against its guardian in the public record, and that together they make
/// a quorum. Returns the ids of the trustees.
fn check_trustees(
    public_parameters: &PublicParameters,
    trustees: &[Arc<dyn DecryptingTrustee>],
) -> Result<BTreeSet<String>> {
    let mut present = BTreeSet::new();

    for trustee in trustees {
        let trustee_id = trustee.id().to_string();
        let guardian = public_parameters.guardians.get(&trustee_id).ok_or_else(|| {
            Error::ConfigurationError(ConfigurationError::UnknownTrustee {
                trustee_id: trustee_id.clone(),
            })
        })?;

        if guardian.x_coordinate() != trustee.x_coordinate()
            || guardian.public_key() != trustee.guardian_public_key()
        {
            return Err(Error::ConfigurationError(
                ConfigurationError::TrusteeMismatch { trustee_id },
            ));
        }

        if !present.insert(trustee_id.clone()) {
            return Err(Error::ConfigurationError(
                ConfigurationError::DuplicateTrustee { trustee_id },
            ));
        }
    }

    let quorum = public_parameters.guardians.quorum();
    if present.len() < quorum as usize {
        return Err(Error::ConfigurationError(
            ConfigurationError::InsufficientQuorum {
                present: present.len(),
                quorum,
            },
        ));
    }

    Ok(present)
}

/// The public counterpart $g^{t_i} = K_i \cdot (\prod_{j \in \text{missing}} g^{P_j(x_i)})^{w_i}$
/// of a compensating trustee's exponent.
fn compensated_public_key(
    public_parameters: &PublicParameters,
    guardian_public_key: &ElementModP,
    coordinate: &LagrangeCoordinate,
    missing_guardians: &[String],
) -> Result<ElementModP> {
    let group = &public_parameters.group;

    let mut missing_shares = group.one_mod_p();
    for missing_guardian_id in missing_guardians {
        let guardian = public_parameters
            .guardians
            .get(missing_guardian_id)
            .ok_or(Error::InternalError)?;
        missing_shares *= guardian.share_public_key(group, coordinate.x_coordinate);
    }

    Ok(*guardian_public_key * missing_shares.pow(&coordinate.coefficient))
}

/// Lays out the texts to send the trustees in the first round, with the item each is the pad
/// of, and registers every item with a fresh builder.
fn prepare(
    contests: &[EncryptedContest],
    mode: DecryptionMode,
) -> Result<(DecryptionsBuilder, Vec<Target>, Vec<ElementModP>)> {
    let mut builder = DecryptionsBuilder::default();
    let mut targets = Vec::new();
    let mut texts = Vec::new();

    let mut contest_ids = BTreeSet::new();
    for contest in contests {
        if !contest_ids.insert(contest.contest_id.as_str()) {
            return Err(Error::ConfigurationError(ConfigurationError::DuplicateItem {
                item_id: contest.contest_id.clone(),
            }));
        }
    }

    if mode == DecryptionMode::Ballot {
        for contest in contests {
            if let Some(contest_data) = &contest.contest_data {
                targets.push(Target::ContestData(contest.contest_id.clone()));
                texts.push(contest_data.c0);
                builder.add_contest_data(contest.contest_id.clone(), contest_data.clone())?;
            }
        }
    }

    for contest in contests {
        for selection in &contest.selections {
            let key = selection_key(&contest.contest_id, &selection.selection_id);
            targets.push(Target::Selection(key.clone()));
            texts.push(selection.ciphertext.pad);
            builder.add_selection(key, selection.ciphertext)?;
        }
    }

    Ok((builder, targets, texts))
}
