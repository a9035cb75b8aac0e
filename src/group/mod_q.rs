// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crypto_bigint::modular::runtime_mod::DynResidue;
use serde::{Serialize, Serializer};

use crate::{ElementModQSizedNumber, Q_LIMBS};

/// An element of $\mathbb{Z}_q$: an exponent of the group.
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct ElementModQ(pub(crate) DynResidue<Q_LIMBS>);

impl ElementModQ {
    /// The canonical (non-Montgomery) value of this element.
    pub fn value(&self) -> ElementModQSizedNumber {
        self.0.retrieve()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == DynResidue::zero(*self.0.params())
    }

    /// The multiplicative inverse, or `None` for zero.
    pub fn inverse(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }

        Some(Self(self.0.invert().0))
    }
}

impl Serialize for ElementModQ {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value().serialize(serializer)
    }
}

impl Add<Self> for ElementModQ {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl<'r> Add<&'r Self> for ElementModQ {
    type Output = Self;

    fn add(self, rhs: &'r Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign<Self> for ElementModQ {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl Sub<Self> for ElementModQ {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl<'r> Sub<&'r Self> for ElementModQ {
    type Output = Self;

    fn sub(self, rhs: &'r Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Self> for ElementModQ {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl<'r> Mul<&'r Self> for ElementModQ {
    type Output = Self;

    fn mul(self, rhs: &'r Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Neg for ElementModQ {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(DynResidue::zero(*self.0.params()) - self.0)
    }
}
