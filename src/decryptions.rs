// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::{
    elgamal::{ElGamalCiphertext, HashedElGamalCiphertext},
    error::{ConfigurationError, ProtocolError},
    group::{ElementModP, ElementModQ},
    Error, Result,
};

/// One trustee's first-round answer for one ciphertext.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct PartialDecryption {
    pub guardian_id: String,
    /// $\bar{M}_i = A^{e_i}$ for the trustee's effective secret exponent $e_i$.
    pub m_bar: ElementModP,
    /// The commitment nonce, handed back to the trustee along with its challenge.
    pub u: ElementModQ,
    /// $a_i = g^{u_i}$
    pub a: ElementModP,
    /// $b_i = A^{u_i}$
    pub b: ElementModP,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct ChallengeRequest {
    pub id: String,
    pub challenge: ElementModQ,
    pub nonce: ElementModQ,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct ChallengeResponse {
    pub id: String,
    pub response: ElementModQ,
}

/// Everything one trustee returned in the first round, keyed by selection key and by contest id.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct TrusteeDecryptions {
    pub trustee_id: String,
    pub selections: HashMap<String, PartialDecryption>,
    pub contest_data: HashMap<String, PartialDecryption>,
}

impl TrusteeDecryptions {
    pub fn new(trustee_id: impl Into<String>) -> Self {
        Self {
            trustee_id: trustee_id.into(),
            ..Default::default()
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct TrusteeChallengeResponses {
    pub trustee_id: String,
    pub responses: Vec<ChallengeResponse>,
}

/// A selection's decryption as it is being assembled.
#[derive(Clone, Debug)]
pub(crate) struct DecryptionResults {
    pub(crate) ciphertext: ElGamalCiphertext,
    pub(crate) shares: BTreeMap<String, PartialDecryption>,
    pub(crate) tally: Option<u32>,
    pub(crate) m: Option<ElementModP>,
    pub(crate) challenge: Option<ElementModQ>,
    pub(crate) responses: BTreeMap<String, ElementModQ>,
}

/// A contest's data decryption as it is being assembled.
#[derive(Clone, Debug)]
pub(crate) struct ContestDataResults {
    pub(crate) ciphertext: HashedElGamalCiphertext,
    pub(crate) shares: BTreeMap<String, PartialDecryption>,
    pub(crate) beta: Option<ElementModP>,
    pub(crate) challenge: Option<ElementModQ>,
    pub(crate) responses: BTreeMap<String, ElementModQ>,
}

/// Collects trustee messages over both decryption rounds. Once every item has a share, a
/// challenge and a response from each present trustee it is frozen into [`Decryptions`].
#[derive(Clone, Debug, Default)]
pub(crate) struct DecryptionsBuilder {
    pub(crate) selections: BTreeMap<String, DecryptionResults>,
    pub(crate) contest_data: BTreeMap<String, ContestDataResults>,
}

impl DecryptionsBuilder {
    pub(crate) fn add_selection(
        &mut self,
        key: String,
        ciphertext: ElGamalCiphertext,
    ) -> Result<()> {
        if self.selections.contains_key(&key) {
            return Err(duplicate_item(key));
        }

        self.selections.insert(
            key,
            DecryptionResults {
                ciphertext,
                shares: BTreeMap::new(),
                tally: None,
                m: None,
                challenge: None,
                responses: BTreeMap::new(),
            },
        );

        Ok(())
    }

    pub(crate) fn add_contest_data(
        &mut self,
        contest_id: String,
        ciphertext: HashedElGamalCiphertext,
    ) -> Result<()> {
        if self.contest_data.contains_key(&contest_id) {
            return Err(duplicate_item(contest_id));
        }

        self.contest_data.insert(
            contest_id,
            ContestDataResults {
                ciphertext,
                shares: BTreeMap::new(),
                beta: None,
                challenge: None,
                responses: BTreeMap::new(),
            },
        );

        Ok(())
    }

    pub(crate) fn add_trustee_decryptions(&mut self, decryptions: TrusteeDecryptions) -> Result<()> {
        let trustee_id = decryptions.trustee_id;

        for (key, share) in decryptions.selections {
            self.selections
                .get_mut(&key)
                .ok_or_else(|| unknown_item(&trustee_id, &key))?
                .shares
                .insert(trustee_id.clone(), share);
        }

        for (contest_id, share) in decryptions.contest_data {
            self.contest_data
                .get_mut(&contest_id)
                .ok_or_else(|| unknown_item(&trustee_id, &contest_id))?
                .shares
                .insert(trustee_id.clone(), share);
        }

        Ok(())
    }

    /// Checks that every item holds a share from each present trustee and from no one else.
    pub(crate) fn check_shares(&self, present: &BTreeSet<String>) -> Result<()> {
        let items = self
            .selections
            .iter()
            .map(|(key, results)| (key, &results.shares))
            .chain(
                self.contest_data
                    .iter()
                    .map(|(key, results)| (key, &results.shares)),
            );

        for (item_id, shares) in items {
            if shares.len() != present.len() || !shares.keys().all(|id| present.contains(id)) {
                return Err(Error::ProtocolError(ProtocolError::ShareSetMismatch {
                    item_id: item_id.clone(),
                    expected: present.len(),
                    received: shares.len(),
                }));
            }
        }

        Ok(())
    }

    /// Builds the second-round requests for `trustee_id`, scaling every collective challenge by
    /// `weight`.
    pub(crate) fn challenge_requests(
        &self,
        trustee_id: &str,
        weight: &ElementModQ,
    ) -> Result<Vec<ChallengeRequest>> {
        let selections = self
            .selections
            .iter()
            .map(|(key, results)| (key, &results.shares, results.challenge));
        let contest_data = self
            .contest_data
            .iter()
            .map(|(key, results)| (key, &results.shares, results.challenge));

        selections
            .chain(contest_data)
            .map(|(item_id, shares, challenge)| -> Result<ChallengeRequest> {
                let challenge = challenge.ok_or_else(|| {
                    Error::ProtocolError(ProtocolError::MissingChallenge {
                        item_id: item_id.clone(),
                    })
                })?;
                let share = shares.get(trustee_id).ok_or_else(|| {
                    Error::ProtocolError(ProtocolError::MissingShare {
                        item_id: item_id.clone(),
                        trustee_id: trustee_id.to_string(),
                    })
                })?;

                Ok(ChallengeRequest {
                    id: item_id.clone(),
                    challenge: *weight * challenge,
                    nonce: share.u,
                })
            })
            .collect()
    }

    pub(crate) fn add_challenge_responses(
        &mut self,
        responses: TrusteeChallengeResponses,
    ) -> Result<()> {
        let trustee_id = responses.trustee_id;

        for ChallengeResponse { id, response } in responses.responses {
            if let Some(results) = self.selections.get_mut(&id) {
                results.responses.insert(trustee_id.clone(), response);
            } else if let Some(results) = self.contest_data.get_mut(&id) {
                results.responses.insert(trustee_id.clone(), response);
            } else {
                return Err(unknown_item(&trustee_id, &id));
            }
        }

        Ok(())
    }

    /// Freezes the collected messages, failing if any item lacks its combined share, its
    /// challenge, or a response from a present trustee.
    pub(crate) fn finalize(self, present: &BTreeSet<String>) -> Result<Decryptions> {
        let selections = self
            .selections
            .into_iter()
            .map(|(key, results)| -> Result<(String, SelectionDecryption)> {
                check_responses(&key, &results.responses, present)?;
                let (m, challenge) = results
                    .m
                    .zip(results.challenge)
                    .ok_or_else(|| missing_challenge(&key))?;

                Ok((
                    key,
                    SelectionDecryption {
                        ciphertext: results.ciphertext,
                        shares: results.shares,
                        tally: results.tally,
                        m,
                        challenge,
                        responses: results.responses,
                    },
                ))
            })
            .collect::<Result<_>>()?;

        let contest_data = self
            .contest_data
            .into_iter()
            .map(|(contest_id, results)| -> Result<(String, ContestDataDecryption)> {
                check_responses(&contest_id, &results.responses, present)?;
                let (beta, challenge) = results
                    .beta
                    .zip(results.challenge)
                    .ok_or_else(|| missing_challenge(&contest_id))?;

                Ok((
                    contest_id,
                    ContestDataDecryption {
                        ciphertext: results.ciphertext,
                        shares: results.shares,
                        beta,
                        challenge,
                        responses: results.responses,
                    },
                ))
            })
            .collect::<Result<_>>()?;

        Ok(Decryptions {
            selections,
            contest_data,
        })
    }
}

fn check_responses(
    item_id: &str,
    responses: &BTreeMap<String, ElementModQ>,
    present: &BTreeSet<String>,
) -> Result<()> {
    match present.iter().find(|id| !responses.contains_key(*id)) {
        Some(trustee_id) => Err(Error::ProtocolError(ProtocolError::MissingResponse {
            item_id: item_id.to_string(),
            trustee_id: trustee_id.clone(),
        })),
        None => Ok(()),
    }
}

fn duplicate_item(item_id: String) -> Error {
    Error::ConfigurationError(ConfigurationError::DuplicateItem { item_id })
}

fn unknown_item(trustee_id: &str, item_id: &str) -> Error {
    Error::ProtocolError(ProtocolError::UnknownItem {
        trustee_id: trustee_id.to_string(),
        item_id: item_id.to_string(),
    })
}

fn missing_challenge(item_id: &str) -> Error {
    Error::ProtocolError(ProtocolError::MissingChallenge {
        item_id: item_id.to_string(),
    })
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct SelectionDecryption {
    pub(crate) ciphertext: ElGamalCiphertext,
    pub(crate) shares: BTreeMap<String, PartialDecryption>,
    pub(crate) tally: Option<u32>,
    pub(crate) m: ElementModP,
    pub(crate) challenge: ElementModQ,
    pub(crate) responses: BTreeMap<String, ElementModQ>,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct ContestDataDecryption {
    pub(crate) ciphertext: HashedElGamalCiphertext,
    pub(crate) shares: BTreeMap<String, PartialDecryption>,
    pub(crate) beta: ElementModP,
    pub(crate) challenge: ElementModQ,
    pub(crate) responses: BTreeMap<String, ElementModQ>,
}

/// The complete, immutable record of both decryption rounds.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct Decryptions {
    pub(crate) selections: BTreeMap<String, SelectionDecryption>,
    pub(crate) contest_data: BTreeMap<String, ContestDataDecryption>,
}

impl Decryptions {
    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&SelectionDecryption> {
        self.selections
            .get(&crate::ballot::selection_key(contest_id, selection_id))
    }

    pub fn contest_data(&self, contest_id: &str) -> Option<&ContestDataDecryption> {
        self.contest_data.get(contest_id)
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::{ballot::selection_key, group::GroupContext, test_exports::test_group};

    fn share(group: &GroupContext, guardian_id: &str) -> PartialDecryption {
        let u = group.random_element_mod_q(&mut OsRng, 2);

        PartialDecryption {
            guardian_id: guardian_id.to_string(),
            m_bar: group.g_pow_p(&group.random_element_mod_q(&mut OsRng, 2)),
            u,
            a: group.g_pow_p(&u),
            b: group.g_pow_p(&u),
        }
    }

    fn builder(group: &GroupContext) -> DecryptionsBuilder {
        let ciphertext = ElGamalCiphertext::new(group.one_mod_p(), group.one_mod_p());
        let mut builder = DecryptionsBuilder::default();
        builder
            .add_selection(selection_key("contest1", "selection1"), ciphertext)
            .unwrap();

        builder
    }

    fn trustee_decryptions(group: &GroupContext, trustee_id: &str) -> TrusteeDecryptions {
        let mut decryptions = TrusteeDecryptions::new(trustee_id);
        decryptions
            .selections
            .insert(selection_key("contest1", "selection1"), share(group, trustee_id));

        decryptions
    }

    #[test]
    fn assembles_decryptions() {
        let group = test_group();
        let present: BTreeSet<String> = ["guardian1", "guardian2"].map(String::from).into();
        let mut builder = builder(&group);

        for trustee_id in &present {
            builder
                .add_trustee_decryptions(trustee_decryptions(&group, trustee_id))
                .unwrap();
        }
        builder.check_shares(&present).unwrap();

        let key = selection_key("contest1", "selection1");
        let challenge = group.random_element_mod_q(&mut OsRng, 0);
        if let Some(results) = builder.selections.get_mut(&key) {
            results.m = Some(group.one_mod_p());
            results.challenge = Some(challenge);
        }

        let weight = group.element_mod_q_from_u64(3);
        for trustee_id in &present {
            let requests = builder.challenge_requests(trustee_id, &weight).unwrap();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].challenge, weight * challenge);
            assert_eq!(requests[0].nonce, builder.selections[&key].shares[trustee_id].u);

            let responses = requests
                .into_iter()
                .map(|request| ChallengeResponse {
                    id: request.id,
                    response: request.nonce,
                })
                .collect();
            builder
                .add_challenge_responses(TrusteeChallengeResponses {
                    trustee_id: trustee_id.clone(),
                    responses,
                })
                .unwrap();
        }

        let decryptions = builder.finalize(&present).unwrap();
        let selection = decryptions.selection("contest1", "selection1").unwrap();
        assert_eq!(selection.challenge, challenge);
        assert_eq!(selection.responses.len(), 2);
    }

    #[test]
    fn rejects_incomplete_or_unknown_messages() {
        let group = test_group();
        let present: BTreeSet<String> = ["guardian1", "guardian2"].map(String::from).into();
        let mut builder = builder(&group);

        builder
            .add_trustee_decryptions(trustee_decryptions(&group, "guardian1"))
            .unwrap();
        assert_eq!(
            builder.check_shares(&present),
            Err(Error::ProtocolError(ProtocolError::ShareSetMismatch {
                item_id: selection_key("contest1", "selection1"),
                expected: 2,
                received: 1,
            }))
        );

        let mut unknown = TrusteeDecryptions::new("guardian2");
        unknown
            .contest_data
            .insert("contest9".to_string(), share(&group, "guardian2"));
        assert!(matches!(
            builder.add_trustee_decryptions(unknown),
            Err(Error::ProtocolError(ProtocolError::UnknownItem { .. }))
        ));

        // no challenge has been computed yet
        assert!(matches!(
            builder.challenge_requests("guardian1", &group.one_mod_q()),
            Err(Error::ProtocolError(ProtocolError::MissingChallenge { .. }))
        ));
        assert!(matches!(
            builder.clone().finalize(&present),
            Err(Error::ProtocolError(ProtocolError::MissingResponse { .. }))
        ));
    }
}
