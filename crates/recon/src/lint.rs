//! Integrality lint over float observations.
//!
//! Runs after conversion and never touches typed values, so disabling it
//! cannot change a run's outcome.

use crate::convert::FloatObservations;
use crate::diagnostics::{DiagnosticPath, Diagnostics};

/// Fields tagged `float` whose finite values were all integral.
pub fn always_integral(observations: &FloatObservations) -> Vec<&str> {
    observations
        .iter()
        .filter(|(_, obs)| obs.finite > 0 && obs.fractional == 0)
        .map(|(field, _)| field)
        .collect()
}

pub fn lint_intfloat(observations: &FloatObservations, diags: &mut Diagnostics, path: &DiagnosticPath) {
    for field in always_integral(observations) {
        diags.advisory(
            &path.with_field(field),
            format!("Float field '{field}' contains only int values (should it be a floatint?)"),
        );
    }
}
