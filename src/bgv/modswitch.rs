use tracing::debug;

use crate::bgv::Ciphertext;
use crate::error::{BgvError, Result};

/// Rescale every component from q_level to q_target.
///
/// Each coefficient c becomes round(center(c)·q_target/q_level) mod q_target.
/// The plaintext scaling Δ_level·m maps to Δ_target·m up to a bias the noise
/// estimate accounts for, so decryption at the new level still yields m.
/// The target must lie strictly below the current level in the chain
/// (current < target ≤ L). Clears the pending-rescale flag.
pub fn switch_modulus(ct: &Ciphertext, target: usize) -> Result<Ciphertext> {
    let params = ct.params();
    let max = params.max_level();
    if target <= ct.level() || target > max {
        return Err(BgvError::InvalidLevel { level: target, max });
    }

    let ctx = params.chain.context(target)?;
    let components = ct
        .components()
        .iter()
        .map(|c| c.rescale(ctx))
        .collect::<Result<Vec<_>>>()?;

    let noise = ct.noise().switch(params, ct.level(), target, ct.degree())?;
    noise.warn_if_exhausted(params, target, "switch_modulus");
    debug!(
        from = ct.level(),
        to = target,
        budget_bits = noise.budget_bits(params, target).unwrap_or(0.0),
        "switched modulus"
    );

    Ok(Ciphertext::new(components, target, false, noise, params))
}
