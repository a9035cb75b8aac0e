// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::collections::HashSet;

use serde::Serialize;

use crate::{
    error::ConfigurationError,
    group::{ElementModQ, GroupContext},
    Error, Result,
};

/// A present guardian's x-coordinate together with its Lagrange coefficient with respect to the
/// present set.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct LagrangeCoordinate {
    pub guardian_id: String,
    pub x_coordinate: u32,
    pub coefficient: ElementModQ,
}

/// Computes the Lagrange coefficient of `x_coordinate` for interpolating at zero over `present`:
/// $w = \prod_{d \ne x} d \,/\, \prod_{d \ne x} (d - x) \bmod q$.
///
/// `present` must contain `x_coordinate` exactly once, and no coordinate twice. A present set of
/// one yields the identity coefficient.
pub fn compute_lagrange_coefficient(
    group: &GroupContext,
    x_coordinate: u32,
    present: &[u32],
) -> Result<ElementModQ> {
    let mut unique_coordinates = HashSet::with_capacity(present.len());
    if let Some(duplicate) = present
        .iter()
        .find(|coordinate| !unique_coordinates.insert(**coordinate))
    {
        return Err(Error::ConfigurationError(
            ConfigurationError::DuplicateCoordinate {
                x_coordinate: *duplicate,
            },
        ));
    }

    if !unique_coordinates.contains(&x_coordinate) {
        return Err(Error::ConfigurationError(
            ConfigurationError::CoordinateNotPresent { x_coordinate },
        ));
    }

    let (numerator, denominator) = present
        .iter()
        .filter(|coordinate| **coordinate != x_coordinate)
        .fold(
            (group.one_mod_q(), group.one_mod_q()),
            |(numerator, denominator), coordinate| {
                // We cannot hold negative numbers in `ElementModQ`, so we map the absolute value
                // of the difference and negate it in the field.
                let difference = group.element_mod_q_from_u64(u64::from(coordinate.abs_diff(x_coordinate)));
                let difference = if *coordinate < x_coordinate {
                    -difference
                } else {
                    difference
                };

                (
                    numerator * group.element_mod_q_from_u64(u64::from(*coordinate)),
                    denominator * difference,
                )
            },
        );

    // Distinct coordinates below q never produce a zero difference.
    let inverse = denominator.inverse().ok_or(Error::InternalError)?;

    Ok(numerator * inverse)
}

/// Computes the [`LagrangeCoordinate`] of every guardian in `present`, given as
/// `(guardian_id, x_coordinate)` pairs.
pub fn lagrange_coordinates<'a>(
    group: &GroupContext,
    present: impl IntoIterator<Item = (&'a str, u32)>,
) -> Result<Vec<LagrangeCoordinate>> {
    let present: Vec<(&str, u32)> = present.into_iter().collect();
    let x_coordinates: Vec<u32> = present.iter().map(|(_, x)| *x).collect();

    present
        .iter()
        .map(|(guardian_id, x_coordinate)| -> Result<LagrangeCoordinate> {
            Ok(LagrangeCoordinate {
                guardian_id: guardian_id.to_string(),
                x_coordinate: *x_coordinate,
                coefficient: compute_lagrange_coefficient(group, *x_coordinate, &x_coordinates)?,
            })
        })
        .collect()
}
