//! Calibrators: transform a raw numeric value into a calibrated one.
//!
//! Semantics (spline interpolation order, extrapolation behavior, polynomial
//! evaluation) are grounded directly on `xtce/calibrators.py` in the
//! original implementation this crate's specification was distilled from.
//! `MathOperationCalibrator` is intentionally not implemented: the source
//! unconditionally raises `NotImplementedError` for it too.

use crate::error::CalibrationError;
use crate::match_criteria::{MatchContext, MatchCriteria};

/// One coefficient/exponent term of a [`Calibrator::Polynomial`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialCoefficient {
    pub coefficient: f64,
    pub exponent: i32,
}

/// One (raw, calibrated) anchor point of a [`Calibrator::Spline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplinePoint {
    pub raw: f64,
    pub calibrated: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Calibrator {
    Polynomial(Vec<PolynomialCoefficient>),
    Spline {
        points: Vec<SplinePoint>,
        order: u8,
        extrapolate: bool,
    },
    /// A calibrator that only applies when its match criteria hold.
    Context {
        match_criteria: MatchCriteria,
        calibrator: Box<Calibrator>,
    },
}

impl Calibrator {
    pub fn new_spline(mut points: Vec<SplinePoint>, order: u8, extrapolate: bool) -> Self {
        points.sort_by(|a, b| a.raw.partial_cmp(&b.raw).unwrap());
        Calibrator::Spline {
            points,
            order,
            extrapolate,
        }
    }

    /// For [`Calibrator::Context`], whether its gating match criteria hold;
    /// every other variant is considered unconditionally applicable. A
    /// caller walking a `ContextCalibratorList` should check this before
    /// calling [`Calibrator::calibrate`], so that "this context doesn't
    /// apply" and "this context applies but the value is out of range" stay
    /// distinguishable.
    pub fn applies(&self, ctx: &MatchContext) -> bool {
        match self {
            Calibrator::Context { match_criteria, .. } => match_criteria.evaluate(ctx).unwrap_or(false),
            _ => true,
        }
    }

    /// Calibrate `x`. `ctx` is consulted only by [`Calibrator::Context`].
    pub fn calibrate(&self, x: f64, ctx: &MatchContext) -> Result<f64, CalibrationError> {
        match self {
            Calibrator::Polynomial(coefficients) => {
                Ok(coefficients.iter().map(|c| c.coefficient * x.powi(c.exponent)).sum())
            }
            Calibrator::Spline {
                points,
                order,
                extrapolate,
            } => spline_calibrate(points, *order, *extrapolate, x),
            Calibrator::Context { calibrator, .. } => calibrator.calibrate(x, ctx),
        }
    }
}

fn spline_calibrate(
    points: &[SplinePoint],
    order: u8,
    extrapolate: bool,
    x: f64,
) -> Result<f64, CalibrationError> {
    if points.is_empty() {
        return Err(CalibrationError::EmptySpline);
    }
    if order > 1 {
        return Err(CalibrationError::UnsupportedOrder(order));
    }

    let min = points.first().unwrap().raw;
    let max = points.last().unwrap().raw;

    if x < min || x > max {
        if !extrapolate {
            return Err(CalibrationError::OutOfRange { value: x, min, max });
        }
        return Ok(if order == 0 {
            if x > max {
                points.last().unwrap().calibrated
            } else {
                points.first().unwrap().calibrated
            }
        } else if x > max && points.len() >= 2 {
            let a = points[points.len() - 2];
            let b = points[points.len() - 1];
            linear(x, a.raw, b.raw, a.calibrated, b.calibrated)
        } else if points.len() >= 2 {
            let a = points[0];
            let b = points[1];
            linear(x, a.raw, b.raw, a.calibrated, b.calibrated)
        } else {
            points[0].calibrated
        });
    }

    // x is within [min, max]: find the greatest raw point not exceeding x.
    let first_greater = points.iter().position(|p| p.raw > x).unwrap_or(points.len());
    let lower_idx = first_greater.saturating_sub(1);

    if order == 0 {
        return Ok(points[lower_idx].calibrated);
    }

    let upper_idx = (lower_idx + 1).min(points.len() - 1);
    let a = points[lower_idx];
    let b = points[upper_idx];
    if a.raw == b.raw {
        return Ok(a.calibrated);
    }
    Ok(linear(x, a.raw, b.raw, a.calibrated, b.calibrated))
}

fn linear(xq: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    ((y1 - y0) / (x1 - x0)) * (xq - x0) + y0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MatchContext {
        MatchContext::empty()
    }

    #[test]
    fn polynomial_evaluates_at_several_points() {
        let cal = Calibrator::Polynomial(vec![
            PolynomialCoefficient { coefficient: 1.5, exponent: 0 },
            PolynomialCoefficient { coefficient: 0.0, exponent: 1 },
            PolynomialCoefficient { coefficient: 1.0, exponent: 2 },
        ]);
        assert_eq!(cal.calibrate(-10.0, &ctx()).unwrap(), 101.5);
        assert_eq!(cal.calibrate(0.0, &ctx()).unwrap(), 1.5);
        assert_eq!(cal.calibrate(50.0, &ctx()).unwrap(), 2501.5);
    }

    #[test]
    fn spline_zero_order_within_range() {
        let cal = Calibrator::new_spline(
            vec![
                SplinePoint { raw: 0.0, calibrated: 10.0 },
                SplinePoint { raw: 10.0, calibrated: 20.0 },
                SplinePoint { raw: 20.0, calibrated: 40.0 },
            ],
            0,
            false,
        );
        assert_eq!(cal.calibrate(5.0, &ctx()).unwrap(), 10.0);
        assert_eq!(cal.calibrate(15.0, &ctx()).unwrap(), 20.0);
    }

    #[test]
    fn spline_zero_order_at_exact_endpoint_no_error() {
        let cal = Calibrator::new_spline(
            vec![
                SplinePoint { raw: 0.0, calibrated: 10.0 },
                SplinePoint { raw: 20.0, calibrated: 40.0 },
            ],
            0,
            false,
        );
        assert_eq!(cal.calibrate(20.0, &ctx()).unwrap(), 40.0);
    }

    #[test]
    fn spline_first_order_interpolates_linearly() {
        let cal = Calibrator::new_spline(
            vec![
                SplinePoint { raw: 0.0, calibrated: 0.0 },
                SplinePoint { raw: 10.0, calibrated: 100.0 },
            ],
            1,
            false,
        );
        assert_eq!(cal.calibrate(5.0, &ctx()).unwrap(), 50.0);
    }

    #[test]
    fn spline_out_of_range_without_extrapolate_errors() {
        let cal = Calibrator::new_spline(
            vec![
                SplinePoint { raw: 0.0, calibrated: 0.0 },
                SplinePoint { raw: 10.0, calibrated: 100.0 },
            ],
            0,
            false,
        );
        assert!(cal.calibrate(50.0, &ctx()).is_err());
    }

    #[test]
    fn spline_extrapolates_when_enabled() {
        let cal = Calibrator::new_spline(
            vec![
                SplinePoint { raw: 0.0, calibrated: 0.0 },
                SplinePoint { raw: 10.0, calibrated: 100.0 },
            ],
            1,
            true,
        );
        assert_eq!(cal.calibrate(20.0, &ctx()).unwrap(), 200.0);
    }

    #[test]
    fn spline_rejects_order_above_one() {
        let cal = Calibrator::new_spline(
            vec![SplinePoint { raw: 0.0, calibrated: 0.0 }],
            2,
            false,
        );
        assert!(matches!(
            cal.calibrate(0.0, &ctx()),
            Err(CalibrationError::UnsupportedOrder(2))
        ));
    }
}
