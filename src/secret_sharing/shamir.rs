// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::iter;
use std::ops::{Add, Mul};

use crate::{Error, Result, SanityCheckError};

/// Polynomial of some degree $n$
///
/// Polynomial has a form: $f(x) = a_0 + a_1 x^1 + \dots{} + a_{n-1} x^{n-1} + a_n x^n$
///
/// Coefficients $a_i$ and indeterminate $x$ are within a ring,
/// and this type is generic for any concrete type that implements ring arithmetic operations.
///
/// In a key ceremony, guardian $j$ holds $P_j$ with $P_j(0)$ its secret key, and hands
/// $P_j(x_i)$ to the guardian at x-coordinate $x_i$.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial<T>
where
    T: Copy + Add<T, Output = T> + Mul<T, Output = T>,
{
    coefficients: Vec<T>,
}

impl<T> Polynomial<T>
where
    T: Copy + Add<T, Output = T> + Mul<T, Output = T>,
{
    /// Constructs polynomial $f(x)$ from list of coefficients $a_0, \dots, a_n$ in the ring
    ///
    /// ## Order
    ///
    /// $a_i$ should corresponds to polynomial $i^{\text{th}}$ coefficient $f(x) = \dots{} + a_i x^i + \dots$
    pub fn from_coefficients(coefficients: Vec<T>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::SanityCheckError(SanityCheckError::InvalidParams()));
        }

        Ok(Self { coefficients })
    }

    /// Samples a polynomial of given `degree` with a fixed constant term (i.e. $a_0 =
    /// \text{constant\\_term}$), drawing every other coefficient from `sample`.
    pub fn sample_with_constant_term(
        degree: u32,
        constant_term: T,
        sample: impl FnMut() -> T,
    ) -> Self {
        let coefficients = iter::once(constant_term)
            .chain(iter::repeat_with(sample).take(degree as usize))
            .collect();

        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    pub fn constant_term(&self) -> T {
        self.coefficients[0]
    }

    /// Takes scalar $x$ and evaluates $f(x)$
    pub fn evaluate(&self, x: &T) -> T {
        // Horner's rule: beginning with the last coefficient, every iteration multiplies
        // everything evaluated so far by `x` and adds the next coefficient, until we finish with the
        // constant term.
        let last_coefficient = self.coefficients[self.coefficients.len() - 1];

        self.coefficients
            .iter()
            .rev()
            .skip(1)
            .fold(
                last_coefficient,
                |partially_evaluated_polynomial, coefficient| {
                    partially_evaluated_polynomial * (*x) + (*coefficient)
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use crypto_bigint::{Wrapping, U64};
    use rand_core::OsRng;

    use super::*;
    use crate::test_exports::test_group;

    #[test]
    fn evaluates() {
        let polynomial = Polynomial::from_coefficients(vec![
            Wrapping(U64::from(1u8)),
            Wrapping(U64::from(2u8)),
            Wrapping(U64::from(3u8)),
        ])
        .unwrap();

        assert_eq!(
            polynomial.evaluate(&Wrapping(U64::from(0u8))),
            Wrapping(U64::from(1u8))
        );

        assert_eq!(
            polynomial.evaluate(&Wrapping(U64::from(5u8))),
            Wrapping(U64::from(86u8))
        );
    }

    #[test]
    fn rejects_empty_coefficients() {
        assert_eq!(
            Polynomial::<Wrapping<U64>>::from_coefficients(vec![]),
            Err(Error::SanityCheckError(SanityCheckError::InvalidParams()))
        );
    }

    #[test]
    fn samples_with_constant_term() {
        let group = test_group();
        let secret = group.element_mod_q_from_u64(42);

        let polynomial = Polynomial::sample_with_constant_term(3, secret, || {
            group.random_element_mod_q(&mut OsRng, 1)
        });

        assert_eq!(polynomial.coefficients().len(), 4);
        assert_eq!(polynomial.constant_term(), secret);
        assert_eq!(polynomial.evaluate(&group.zero_mod_q()), secret);
        assert_ne!(polynomial.evaluate(&group.one_mod_q()), secret);
    }
}
