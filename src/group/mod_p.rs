// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::ops::{Div, Mul, MulAssign};

use crypto_bigint::{modular::runtime_mod::DynResidue, Encoding};
use serde::{Serialize, Serializer};

use super::ElementModQ;
use crate::{ElementModPSizedNumber, P_LIMBS};

/// An element of $\mathbb{Z}_p^*$, in multiplicative notation.
///
/// Elements are only ever constructed through a [`GroupContext`](super::GroupContext), which
/// guarantees they are non-zero and reduced; hence every element is invertible.
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct ElementModP(pub(crate) DynResidue<P_LIMBS>);

impl ElementModP {
    /// The canonical (non-Montgomery) value of this element.
    pub fn value(&self) -> ElementModPSizedNumber {
        self.0.retrieve()
    }

    pub fn pow(&self, exponent: &ElementModQ) -> Self {
        Self(self.0.pow(&exponent.value()))
    }

    pub fn inverse(&self) -> Self {
        // In a group, every element has its inverse; because `self` is an element within the
        // group, `invert()` is guaranteed to succeed and we skip the check.
        Self(self.0.invert().0)
    }

    pub fn is_one(&self) -> bool {
        self.0 == DynResidue::one(*self.0.params())
    }

    pub(crate) fn to_be_bytes(&self) -> <ElementModPSizedNumber as Encoding>::Repr {
        self.value().to_be_bytes()
    }
}

impl Serialize for ElementModP {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value().serialize(serializer)
    }
}

impl Mul<Self> for ElementModP {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl<'r> Mul<&'r Self> for ElementModP {
    type Output = Self;

    fn mul(self, rhs: &'r Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Div<Self> for ElementModP {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self::Output {
        // Division is multiplication by the inverse of `rhs`.
        Self(self.0 * rhs.inverse().0)
    }
}

impl<'r> Div<&'r Self> for ElementModP {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: &'r Self) -> Self::Output {
        Self(self.0 * rhs.inverse().0)
    }
}

impl MulAssign<Self> for ElementModP {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs
    }
}

impl<'r> MulAssign<&'r Self> for ElementModP {
    fn mul_assign(&mut self, rhs: &'r Self) {
        *self = *self * rhs
    }
}
