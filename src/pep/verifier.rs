// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use super::{BallotPep, SelectionPep};
use crate::{
    elgamal::ElGamalPublicKey, error_messages::ErrorMessages, group::GroupContext,
    ExtendedBaseHash, PublicParameters,
};

/// Re-verifies a [`BallotPep`] from its published values alone, trusting neither the parties
/// that blinded it nor the trustees that decrypted it.
#[derive(Clone, Debug)]
pub struct VerifierPep {
    group: GroupContext,
    extended_base_hash: ExtendedBaseHash,
    joint_public_key: ElGamalPublicKey,
}

impl VerifierPep {
    pub fn new(public_parameters: &PublicParameters) -> Self {
        Self {
            group: public_parameters.group.clone(),
            extended_base_hash: public_parameters.extended_base_hash,
            joint_public_key: public_parameters.joint_public_key,
        }
    }

    /// Verifies every selection of `ballot_pep`, returning all failures.
    pub fn verify(&self, ballot_pep: &BallotPep) -> Result<(), ErrorMessages> {
        let mut errs = ErrorMessages::new(format!("ballot {}", ballot_pep.ballot_id));
        self.verify_into(ballot_pep, &mut errs);

        if errs.has_errors() {
            Err(errs)
        } else {
            Ok(())
        }
    }

    /// Verifies every selection of `ballot_pep`, recording failures in `errs`.
    pub fn verify_into(&self, ballot_pep: &BallotPep, errs: &mut ErrorMessages) {
        let mut all_equal = true;

        for contest in &ballot_pep.contests {
            let contest_errs = errs.nested(format!("contest {}", contest.contest_id));

            for selection in &contest.selections {
                all_equal &= selection.is_equal;
                self.verify_selection(
                    selection,
                    contest_errs.nested(format!("selection {}", selection.selection_id)),
                );
            }
        }

        if ballot_pep.is_equal != all_equal {
            errs.add("ballot equality does not match its selections");
        }
    }

    fn verify_selection(&self, selection: &SelectionPep, errs: &mut ErrorMessages) {
        if selection
            .blinding_proof
            .verify_blinding(
                &self.group,
                &self.extended_base_hash,
                &self.joint_public_key,
                &selection.ciphertext_ratio,
                &selection.ciphertext_ab,
            )
            .is_err()
        {
            errs.add("blinding proof failed to verify");
        }

        if selection
            .decryption_proof
            .verify_decryption(
                &self.group,
                &self.extended_base_hash,
                &self.joint_public_key,
                &selection.ciphertext_ab,
                &selection.t,
            )
            .is_err()
        {
            errs.add("decryption proof failed to verify");
        }

        // A zero blinding exponent maps any ratio to $(1, 1)$ and so to $T = 1$.
        if selection.ciphertext_ab.is_one() && !selection.ciphertext_ratio.is_one() {
            errs.add("ratio was blinded to the identity");
        }

        if selection.is_equal != selection.t.is_one() {
            errs.add("equality does not match the decryption");
        }
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::{
        pep::PlaintextEquivalenceProof,
        proofs::ChaumPedersenProof,
        test_exports::{encrypt_ballot, test_group, KeyCeremony},
        Decryptor,
    };

    fn ballot_pep(ceremony: &KeyCeremony) -> BallotPep {
        let public_parameters = ceremony.public_parameters();
        let first = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[1, 0])], None);
        let second = encrypt_ballot(&public_parameters, "ballot", &[("contest1", &[0, 0])], None);
        let pep = PlaintextEquivalenceProof::new(
            Decryptor::new(public_parameters, ceremony.key_share_trustees(&[1, 2])).unwrap(),
        );

        let mut errs = ErrorMessages::new("pep");
        let ballot_pep = pep.do_pep(&first, &second, &mut OsRng, &mut errs).unwrap();
        assert!(!errs.has_errors(), "{errs}");

        ballot_pep
    }

    fn errors(verifier: &VerifierPep, ballot_pep: &BallotPep) -> Vec<String> {
        verifier
            .verify(ballot_pep)
            .err()
            .map(|errs| errs.errors().into_iter().map(|(_, message)| message).collect())
            .unwrap_or_default()
    }

    #[test]
    fn verifies_honest_comparison() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let ballot_pep = ballot_pep(&ceremony);

        assert_eq!(
            VerifierPep::new(&ceremony.public_parameters()).verify(&ballot_pep),
            Ok(())
        );
    }

    #[test]
    fn rejects_tampered_comparison() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let verifier = VerifierPep::new(&ceremony.public_parameters());
        let honest = ballot_pep(&ceremony);

        // claiming the differing selection is equal
        let mut tampered = honest.clone();
        tampered.contests[0].selections[0].is_equal = true;
        tampered.is_equal = true;
        assert_eq!(
            errors(&verifier, &tampered),
            vec!["equality does not match the decryption"]
        );

        // forging the decryption to the identity
        let mut tampered = honest.clone();
        tampered.contests[0].selections[0].t = group.one_mod_p();
        assert_eq!(
            errors(&verifier, &tampered),
            vec![
                "decryption proof failed to verify",
                "equality does not match the decryption"
            ]
        );

        // inconsistent ballot flag
        let mut tampered = honest.clone();
        tampered.is_equal = true;
        assert_eq!(
            errors(&verifier, &tampered),
            vec!["ballot equality does not match its selections"]
        );

        // replacing the blinding
        let mut tampered = honest.clone();
        let selection = &mut tampered.contests[0].selections[0];
        selection.ciphertext_ab = selection.ciphertext_ab.pow(&group.element_mod_q_from_u64(2));
        assert!(errors(&verifier, &tampered)
            .contains(&"blinding proof failed to verify".to_string()));
    }

    #[test]
    fn rejects_blinding_to_identity() {
        let group = test_group();
        let ceremony = KeyCeremony::new(&group, 3, 2, &mut OsRng);
        let public_parameters = ceremony.public_parameters();
        let verifier = VerifierPep::new(&public_parameters);
        let mut ballot_pep = ballot_pep(&ceremony);

        // blinding with $\xi = 0$ yields a valid proof that the differing selection is equal
        let selection = &mut ballot_pep.contests[0].selections[0];
        let ratio = selection.ciphertext_ratio;
        let blinded = ratio.pow(&group.zero_mod_q());
        let u = group.random_element_mod_q(&mut OsRng, 2);
        let commitment = ratio.pow(&u);
        let challenge = crate::proofs::blinding_challenge(
            &group,
            &public_parameters.extended_base_hash,
            &public_parameters.joint_public_key,
            &ratio,
            &blinded,
            &commitment.pad,
            &commitment.data,
        );
        selection.ciphertext_ab = blinded;
        selection.blinding_proof = ChaumPedersenProof::new(challenge, u);
        selection.t = group.one_mod_p();
        selection.is_equal = true;
        ballot_pep.is_equal = true;

        assert!(errors(&verifier, &ballot_pep)
            .contains(&"ratio was blinded to the identity".to_string()));
    }
}
