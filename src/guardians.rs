// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    elgamal::ElGamalPublicKey,
    group::{ElementModP, GroupContext},
    Error, Result, SanityCheckError,
};

/// The public record of one guardian from the key ceremony: its x-coordinate and the commitments
/// $K_{i,k} = g^{a_{i,k}}$ to the coefficients of its secret polynomial.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct Guardian {
    id: String,
    x_coordinate: u32,
    coefficient_commitments: Vec<ElementModP>,
}

impl Guardian {
    pub fn new(
        id: impl Into<String>,
        x_coordinate: u32,
        coefficient_commitments: Vec<ElementModP>,
    ) -> Result<Self> {
        if x_coordinate == 0 || coefficient_commitments.is_empty() {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        Ok(Self {
            id: id.into(),
            x_coordinate,
            coefficient_commitments,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    pub fn coefficient_commitments(&self) -> &[ElementModP] {
        &self.coefficient_commitments
    }

    /// The guardian's public key $K_i = K_{i,0}$.
    pub fn public_key(&self) -> &ElementModP {
        &self.coefficient_commitments[0]
    }

    /// Computes $g^{P_i(x)} = \prod_k K_{i,k}^{x^k}$ without knowledge of $P_i$.
    pub fn share_public_key(&self, group: &GroupContext, x_coordinate: u32) -> ElementModP {
        let x = group.element_mod_q_from_u64(u64::from(x_coordinate));
        let mut x_power = group.one_mod_q();
        let mut share_public_key = group.one_mod_p();

        for commitment in &self.coefficient_commitments {
            share_public_key *= commitment.pow(&x_power);
            x_power = x_power * x;
        }

        share_public_key
    }
}

/// All guardians of an election.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct Guardians {
    guardians: Vec<Guardian>,
}

impl Guardians {
    /// Checks that ids and x-coordinates are unique and that every guardian committed to a
    /// polynomial of the same degree.
    pub fn new(guardians: Vec<Guardian>) -> Result<Self> {
        let quorum = guardians
            .first()
            .map(|guardian| guardian.coefficient_commitments.len())
            .ok_or(Error::SanityCheckError(SanityCheckError::InvalidParams()))?;

        let ids: HashSet<&str> = guardians.iter().map(|guardian| guardian.id()).collect();
        let x_coordinates: HashSet<u32> = guardians
            .iter()
            .map(|guardian| guardian.x_coordinate())
            .collect();

        if ids.len() != guardians.len()
            || x_coordinates.len() != guardians.len()
            || guardians
                .iter()
                .any(|guardian| guardian.coefficient_commitments.len() != quorum)
            || quorum > guardians.len()
        {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        Ok(Self { guardians })
    }

    pub fn get(&self, id: &str) -> Option<&Guardian> {
        self.guardians.iter().find(|guardian| guardian.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guardian> {
        self.guardians.iter()
    }

    pub fn len(&self) -> usize {
        self.guardians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardians.is_empty()
    }

    /// The number of guardians needed to decrypt, i.e. the number of coefficients of each
    /// guardian's polynomial.
    pub fn quorum(&self) -> u32 {
        // `new` assures all guardians agree on this, and that there is at least one.
        self.guardians[0].coefficient_commitments.len() as u32
    }

    /// The joint election public key $K = \prod_i K_i$.
    pub fn joint_public_key(&self, group: &GroupContext) -> ElGamalPublicKey {
        ElGamalPublicKey::new(
            group.product(self.guardians.iter().map(|guardian| guardian.public_key())),
        )
    }

    /// Computes $g^{P(x)} = \prod_j g^{P_j(x)}$, where $P = \sum_j P_j$ is the joint polynomial.
    /// At a present guardian's x-coordinate this is the public counterpart of its key share.
    pub fn g_exp_p(&self, group: &GroupContext, x_coordinate: u32) -> ElementModP {
        self.guardians
            .iter()
            .fold(group.one_mod_p(), |product, guardian| {
                product * guardian.share_public_key(group, x_coordinate)
            })
    }
}
