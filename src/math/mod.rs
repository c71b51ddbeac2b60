//! Numerical building blocks: seedable random generators and the inverse
//! normal CDF used to turn uniforms into Gaussians.

pub mod fast_norm;
pub mod fast_rng;

pub use fast_norm::norm_inv_cdf;
pub use fast_rng::{FastRng, FastRngKind};
