// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    rand_core::CryptoRngCore,
    NonZero, RandomMod, Uint, Word,
};
use serde::{ser::SerializeStruct, Serialize, Serializer};

pub use mod_p::ElementModP;
pub use mod_q::ElementModQ;

use crate::{
    ElementModPSizedNumber, ElementModQSizedNumber, Error, Result, SanityCheckError,
    WideChallengeSizedNumber, P_LIMBS, Q_LIMBS,
};

mod mod_p;
mod mod_q;

/// The group an election is run in: the prime-order-$q$ subgroup of $\mathbb{Z}_p^*$ generated by
/// $g$.
///
/// All elements handed out by a context are bound to its moduli; mixing elements of two different
/// contexts is a logic error.
#[derive(Clone, Debug)]
pub struct GroupContext {
    p_params: DynResidueParams<P_LIMBS>,
    q_params: DynResidueParams<Q_LIMBS>,
    q: NonZero<ElementModQSizedNumber>,
    wide_q: NonZero<WideChallengeSizedNumber>,
    generator: ElementModP,
}

impl PartialEq for GroupContext {
    fn eq(&self, other: &Self) -> bool {
        self.p_params == other.p_params
            && self.q_params == other.q_params
            && self.generator == other.generator
    }
}

impl Eq for GroupContext {}

impl Serialize for GroupContext {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("GroupContext", 3)?;
        state.serialize_field("p", self.p())?;
        state.serialize_field("q", self.q())?;
        state.serialize_field("g", &self.generator)?;
        state.end()
    }
}

impl GroupContext {
    /// Instantiates the group of order `q` in $\mathbb{Z}_p^*$ generated by `g`.
    ///
    /// Primality of `p` and `q` is not checked; this verifies only what is needed for the
    /// arithmetic to be sound: both moduli are odd, `q < p`, and `g` is a non-trivial element of
    /// order `q`.
    pub fn new(
        p: ElementModPSizedNumber,
        q: ElementModQSizedNumber,
        g: ElementModPSizedNumber,
    ) -> Result<Self> {
        if !is_odd(&p)
            || !is_odd(&q)
            || q == ElementModQSizedNumber::ONE
            || q.resize::<P_LIMBS>() >= p
            || g <= ElementModPSizedNumber::ONE
            || g >= p
        {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        let non_zero_q: Option<NonZero<ElementModQSizedNumber>> = NonZero::new(q).into();
        let wide_q: Option<NonZero<WideChallengeSizedNumber>> =
            NonZero::new(q.resize::<{ WideChallengeSizedNumber::LIMBS }>()).into();
        let (q_modulus, wide_q) = non_zero_q
            .zip(wide_q)
            .ok_or(Error::SanityCheckError(SanityCheckError::InvalidParams()))?;

        let p_params = DynResidueParams::new(&p);
        let q_params = DynResidueParams::new(&q);
        let generator = DynResidue::new(&g, p_params);

        if generator.pow_bounded_exp(&q, bit_length(&q)) != DynResidue::one(p_params) {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        Ok(Self {
            p_params,
            q_params,
            q: q_modulus,
            wide_q,
            generator: ElementModP(generator),
        })
    }

    pub fn p(&self) -> &ElementModPSizedNumber {
        self.p_params.modulus()
    }

    pub fn q(&self) -> &ElementModQSizedNumber {
        self.q_params.modulus()
    }

    pub fn generator(&self) -> &ElementModP {
        &self.generator
    }

    /// Computes $g^e \bmod p$.
    pub fn g_pow_p(&self, exponent: &ElementModQ) -> ElementModP {
        self.generator.pow(exponent)
    }

    pub fn one_mod_p(&self) -> ElementModP {
        ElementModP(DynResidue::one(self.p_params))
    }

    pub fn one_mod_q(&self) -> ElementModQ {
        ElementModQ(DynResidue::one(self.q_params))
    }

    pub fn zero_mod_q(&self) -> ElementModQ {
        ElementModQ(DynResidue::zero(self.q_params))
    }

    /// Lifts `value` into $\mathbb{Z}_p^*$, rejecting zero and anything not below $p$.
    ///
    /// Subgroup membership is not checked here, see [`Self::is_valid_residue`].
    pub fn element_mod_p(&self, value: ElementModPSizedNumber) -> Result<ElementModP> {
        if value == ElementModPSizedNumber::ZERO || &value >= self.p() {
            return Err(Error::SanityCheckError(
                SanityCheckError::InvalidGroupElement(),
            ));
        }

        Ok(ElementModP(DynResidue::new(&value, self.p_params)))
    }

    /// Reduces `value` modulo $q$.
    pub fn element_mod_q(&self, value: ElementModQSizedNumber) -> ElementModQ {
        let reduced = value % self.q;

        ElementModQ(DynResidue::new(&reduced, self.q_params))
    }

    pub fn element_mod_q_from_u64(&self, value: u64) -> ElementModQ {
        self.element_mod_q(ElementModQSizedNumber::from(value))
    }

    /// Reduces a challenge drawn from a transcript modulo $q$.
    pub(crate) fn reduce_wide(&self, value: WideChallengeSizedNumber) -> ElementModQ {
        let reduced = value % self.wide_q;

        ElementModQ(DynResidue::new(
            &reduced.resize::<Q_LIMBS>(),
            self.q_params,
        ))
    }

    /// Uniformly samples an element of $[\text{minimum}, q)$.
    pub fn random_element_mod_q(
        &self,
        rng: &mut impl CryptoRngCore,
        minimum: u64,
    ) -> ElementModQ {
        let minimum = ElementModQSizedNumber::from(minimum);

        // Classic rejection-sampling technique.
        loop {
            let value = ElementModQSizedNumber::random_mod(rng, &self.q);

            if value >= minimum {
                return ElementModQ(DynResidue::new(&value, self.q_params));
            }
        }
    }

    /// Checks that `element` lies in the order-$q$ subgroup.
    pub fn is_valid_residue(&self, element: &ElementModP) -> bool {
        element.0.pow_bounded_exp(self.q(), bit_length(self.q())) == DynResidue::one(self.p_params)
    }

    /// Multiplies all of `elements` together, yielding one for an empty iterator.
    pub fn product<'a>(&self, elements: impl IntoIterator<Item = &'a ElementModP>) -> ElementModP {
        elements
            .into_iter()
            .fold(self.one_mod_p(), |product, element| product * element)
    }

    /// Adds all of `elements` together, yielding zero for an empty iterator.
    pub fn sum<'a>(&self, elements: impl IntoIterator<Item = &'a ElementModQ>) -> ElementModQ {
        elements
            .into_iter()
            .fold(self.zero_mod_q(), |sum, element| sum + element)
    }
}

fn is_odd<const LIMBS: usize>(value: &Uint<LIMBS>) -> bool {
    value.as_words()[0] & 1 == 1
}

fn bit_length<const LIMBS: usize>(value: &Uint<LIMBS>) -> usize {
    value
        .as_words()
        .iter()
        .enumerate()
        .rev()
        .find(|(_, word)| **word != 0)
        .map(|(i, word)| i * (Word::BITS as usize) + (Word::BITS - word.leading_zeros()) as usize)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;
    use rstest::rstest;

    use super::*;
    use crate::test_exports::{test_g, test_group, test_p, test_q};

    #[test]
    fn rejects_invalid_params() {
        let (p, q, g) = (test_p(), test_q(), test_g());

        assert!(GroupContext::new(p, q, g).is_ok());

        // even modulus
        assert_eq!(
            GroupContext::new(p.wrapping_add(&ElementModPSizedNumber::ONE), q, g),
            Err(Error::SanityCheckError(SanityCheckError::InvalidParams()))
        );

        // trivial generator
        assert_eq!(
            GroupContext::new(p, q, ElementModPSizedNumber::ONE),
            Err(Error::SanityCheckError(SanityCheckError::InvalidParams()))
        );

        // 3 is not of order q in this group
        assert_eq!(
            GroupContext::new(p, q, ElementModPSizedNumber::from(3u8)),
            Err(Error::SanityCheckError(SanityCheckError::InvalidParams()))
        );
    }

    #[test]
    fn element_mod_p_rejects_out_of_range_values() {
        let group = test_group();

        assert!(group.element_mod_p(ElementModPSizedNumber::ZERO).is_err());
        assert!(group.element_mod_p(*group.p()).is_err());
        assert!(group.element_mod_p(ElementModPSizedNumber::ONE).is_ok());
    }

    #[test]
    fn generator_powers_are_residues() {
        let group = test_group();
        let exponent = group.random_element_mod_q(&mut OsRng, 2);

        assert!(group.is_valid_residue(&group.g_pow_p(&exponent)));
        assert!(group.is_valid_residue(&group.one_mod_p()));

        // p - 1 has order 2
        let minus_one = group
            .element_mod_p(group.p().wrapping_sub(&ElementModPSizedNumber::ONE))
            .unwrap();
        assert!(!group.is_valid_residue(&minus_one));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(1000)]
    fn exponent_arithmetic_is_consistent(#[case] small: u64) {
        let group = test_group();
        let x = group.random_element_mod_q(&mut OsRng, 0);
        let y = group.element_mod_q_from_u64(small);

        assert_eq!(
            group.g_pow_p(&(x + y)),
            group.g_pow_p(&x) * group.g_pow_p(&y)
        );
        assert_eq!(
            group.g_pow_p(&(x - y)),
            group.g_pow_p(&x) / group.g_pow_p(&y)
        );
        assert_eq!(group.g_pow_p(&(x * y)), group.g_pow_p(&x).pow(&y));
        assert_eq!(x + (-x), group.zero_mod_q());
    }

    #[test]
    fn element_mod_q_reduces() {
        let group = test_group();

        assert_eq!(group.element_mod_q(*group.q()), group.zero_mod_q());
        assert_eq!(
            group.element_mod_q(group.q().wrapping_add(&ElementModQSizedNumber::ONE)),
            group.one_mod_q()
        );
    }

    #[test]
    fn inverts() {
        let group = test_group();
        let x = group.random_element_mod_q(&mut OsRng, 2);

        assert_eq!(x * x.inverse().unwrap(), group.one_mod_q());
        assert_eq!(group.zero_mod_q().inverse(), None);

        let element = group.g_pow_p(&x);
        assert_eq!(element * element.inverse(), group.one_mod_p());
    }

    #[test]
    fn random_element_respects_minimum() {
        let group = test_group();

        for _ in 0..20 {
            let x = group.random_element_mod_q(&mut OsRng, 2);
            assert_ne!(x, group.zero_mod_q());
            assert_ne!(x, group.one_mod_q());
        }
    }
}
