use crate::domain::{
    ActivationEnergyResult, BOLTZMANN_EV_PER_K, ComputeResult, DiffusionError, FitConfidence,
};
use crate::numerics::{FitError, linear_fit};
use tracing::{info, warn};

/// Arrhenius fit of `ln D` against `1 / T`.
///
/// `D = D0 exp(-Ea / kB T)` is linear in that space with slope `-Ea / kB` and
/// intercept `ln D0`.
pub fn fit_arrhenius(
    temperatures_k: &[f64],
    diffusion_coefficients: &[f64],
) -> ComputeResult<ActivationEnergyResult> {
    if temperatures_k.len() != diffusion_coefficients.len() {
        return Err(DiffusionError::data_precondition(
            "DATA.ARRHENIUS_SHAPE",
            format!(
                "got {} temperatures but {} diffusion coefficients",
                temperatures_k.len(),
                diffusion_coefficients.len()
            ),
        ));
    }
    if temperatures_k.len() < 2 {
        return Err(DiffusionError::data_precondition(
            "DATA.ARRHENIUS_TOO_FEW_POINTS",
            format!(
                "activation energy needs at least 2 temperatures, got {}",
                temperatures_k.len()
            ),
        ));
    }
    for (index, (&temperature, &coefficient)) in temperatures_k
        .iter()
        .zip(diffusion_coefficients)
        .enumerate()
    {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(DiffusionError::data_precondition(
                "DATA.ARRHENIUS_TEMPERATURE",
                format!(
                    "temperature {} at position {} must be positive and finite",
                    temperature, index
                ),
            ));
        }
        if !(coefficient.is_finite() && coefficient > 0.0) {
            return Err(DiffusionError::data_precondition(
                "DATA.ARRHENIUS_NON_POSITIVE_D",
                format!(
                    "diffusion coefficient {} at {} K is not positive; ln D is undefined",
                    coefficient, temperature
                ),
            ));
        }
        if temperatures_k[..index].contains(&temperature) {
            return Err(DiffusionError::data_precondition(
                "DATA.ARRHENIUS_DUPLICATE_TEMPERATURE",
                format!("temperature {} K appears more than once", temperature),
            ));
        }
    }

    let inverse_temperature: Vec<f64> = temperatures_k.iter().map(|t| 1.0 / t).collect();
    let log_diffusion: Vec<f64> = diffusion_coefficients.iter().map(|d| d.ln()).collect();
    let fit = linear_fit(&inverse_temperature, &log_diffusion).map_err(|error| match error {
        FitError::Singular { .. } => {
            DiffusionError::computation("RUN.ARRHENIUS_SINGULAR", error.to_string())
        }
        other => DiffusionError::data_precondition("DATA.ARRHENIUS_INPUT", other.to_string()),
    })?;

    let std_error_ev = fit
        .slope_std_error()
        .map(|error| error * BOLTZMANN_EV_PER_K);
    let confidence = if std_error_ev.is_some() {
        FitConfidence::Nominal
    } else {
        warn!("Arrhenius fit over two temperatures has no standard error");
        FitConfidence::low("fit over exactly two temperatures has no standard error")
    };

    let result = ActivationEnergyResult {
        activation_energy_ev: -fit.slope * BOLTZMANN_EV_PER_K,
        prefactor: fit.intercept.exp(),
        std_error_ev,
        point_count: fit.point_count,
        confidence,
    };
    info!(
        points = result.point_count,
        activation_energy_ev = result.activation_energy_ev,
        prefactor = result.prefactor,
        "fitted activation energy"
    );
    Ok(result)
}
