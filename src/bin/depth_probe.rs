//! Walks a preset through its full multiplicative depth and logs the
//! estimated and measured noise budget after every step.
//!
//! Usage: `depth_probe [compact|standard] [seed]`. Set `RUST_LOG=debug`
//! to see per-operation events from the library.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bgv_core::params::presets;
use bgv_core::prelude::*;

type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const FACTORS: [u64; 4] = [7, 11, 3, 5];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "depth probe failed");
            ExitCode::FAILURE
        }
    }
}

fn load_preset(name: &str) -> AppResult<Arc<BgvParams>> {
    let params = match name {
        "toy" => return Err("the toy preset only decrypts with a noiseless sampler".into()),
        "compact" => presets::compact()?,
        "standard" => presets::standard()?,
        other => return Err(format!("unknown preset {other:?}, expected compact or standard").into()),
    };
    Ok(params)
}

fn run() -> AppResult<()> {
    let mut args = std::env::args().skip(1);
    let preset = args.next().unwrap_or_else(|| "compact".to_string());
    let seed = args.next().map(|s| s.parse::<u64>()).transpose()?;

    let params = load_preset(&preset)?;
    let sampler = || match seed {
        Some(seed) => ChaChaSampler::from_seed(seed, params.sigma),
        None => ChaChaSampler::from_os_rng(params.sigma),
    };

    info!(
        preset = %preset,
        n = params.ring_degree,
        t = params.plain_modulus,
        levels = params.chain.len(),
        moduli = ?params.chain.moduli(),
        "parameters"
    );

    let (sk, pk, rlk) = KeyManager::new(&params, sampler()).generate_keys()?;
    let mut enc = Encryptor::new(&pk, sampler());
    let dec = Decryptor::new(&sk);
    let eval = Evaluator::new(&params);
    let t = params.plain_modulus;

    let first = FACTORS[0] % t;
    let mut acc = enc.encrypt_scalar(first)?;
    let mut expected = first;
    report(&dec, &acc, expected)?;

    for step in 0..params.max_level() {
        let k = FACTORS[(step + 1) % FACTORS.len()] % t;
        let mut factor = enc.encrypt_scalar(k)?;
        if acc.level() > 0 {
            factor = eval.switch_modulus(&factor, acc.level())?;
        }
        acc = eval.multiply_and_rescale(&acc, &factor, &rlk)?;
        expected = expected * k % t;
        report(&dec, &acc, expected)?;
    }

    let extra = eval.switch_modulus(&enc.encrypt_scalar(1)?, acc.level());
    match extra.and_then(|one| eval.multiply(&acc, &one)) {
        Err(BgvError::DepthExhausted { level }) => info!(level, "depth exhausted as expected"),
        Err(e) => return Err(e.into()),
        Ok(_) => warn!("multiplication at the terminal level was accepted"),
    }
    Ok(())
}

fn report(dec: &Decryptor<'_>, ct: &Ciphertext, expected: u64) -> AppResult<()> {
    let got = dec.decrypt_scalar(ct)?;
    let estimated = ct.estimated_budget_bits()?;
    let measured = dec.invariant_noise_budget(ct)?;
    if got == expected {
        info!(level = ct.level(), value = got, estimated, measured, "decrypted");
    } else {
        warn!(level = ct.level(), got, expected, estimated, measured, "decryption mismatch");
    }
    Ok(())
}
