//! Mean-squared-displacement analysis of molecular-dynamics trajectories:
//! diffusion coefficients, their convergence with averaging window, atomic
//! jump detection, and Arrhenius activation energies.

pub mod domain;
pub mod io;
pub mod modules;
pub mod numerics;
