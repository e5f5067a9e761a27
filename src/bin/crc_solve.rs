//! Minimal CLI driver over [`crc_sleuth::Solver`].
//!
//! Reads observations from `--observation 'HEX_BYTES:TARGET_HEX'` flags (one
//! per occurrence, repeatable), runs the search over a configurable `order`,
//! and prints every emitted `(poly, dir, init, post)` as JSON lines.
//!
//! This is a worked-example driver, not a full message-algebra front end —
//! each observation is a plain fixed byte string plus a declared target, the
//! `Concat(data(...), target(...))` shape from the S1/S2 scenarios. Richer
//! expressions (`Optional`/`Repeat`/`Permute`/`Combine`) are a library API,
//! not exposed on this CLI.

#![forbid(unsafe_code)]

use std::env;

use crc_sleuth::{concat, data, target, Direction, SearchSet, Solver};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn parse_all_flags(args: &[String], key: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            if let Some(v) = it.next() {
                out.push(v.clone());
            }
        }
    }
    out
}

fn parse_hex_bytes(s: &str) -> anyhow::Result<Vec<u64>> {
    let bytes = hex::decode(s).map_err(|e| anyhow::anyhow!("invalid hex `{s}`: {e}"))?;
    Ok(bytes.into_iter().map(|b| b as u64).collect())
}

fn parse_observation(spec: &str) -> anyhow::Result<crc_sleuth::MessageExpr> {
    let (msg_hex, target_hex) = spec
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("observation `{spec}` must be MESSAGE_HEX:TARGET_HEX"))?;
    let words = parse_hex_bytes(msg_hex)?;
    let target_value =
        u64::from_str_radix(target_hex.trim_start_matches("0x"), 16).map_err(|e| anyhow::anyhow!("invalid target `{target_hex}`: {e}"))?;
    Ok(concat(data(&words, 8), target(target_value)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "crc_solve=info,crc_sleuth=info".into()))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    let order: u32 = parse_flag(&args, "--order").and_then(|s| s.parse().ok()).unwrap_or(8);
    let same_length = parse_flag(&args, "--same-length").map(|s| matches!(s.as_str(), "1" | "true" | "yes")).unwrap_or(false);
    let narrow_post = parse_flag(&args, "--post").and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok());

    let observation_specs = parse_all_flags(&args, "--observation");
    if observation_specs.is_empty() {
        eprintln!(
            "usage: crc_solve --order 8 --observation 41:5e [--observation ...] [--post 0] [--same-length]"
        );
        eprintln!("example (S1): crc_solve --order 8 --observation 41:5e");
        return Ok(());
    }

    let mut solver = Solver::new(order)?;
    for spec in &observation_specs {
        solver.add(&parse_observation(spec)?)?;
    }
    if let Some(post) = narrow_post {
        solver.search_post = SearchSet::from_values([post]);
    }

    eprintln!(
        "searching order={} over {} observation(s), same_length={}",
        order,
        solver.observation_count(),
        same_length
    );

    let results = solver.solve(same_length)?;
    eprintln!("found {} parameterisation(s)", results.len());
    for record in &results {
        let dir_str = match record.dir {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        };
        println!(
            "{}",
            serde_json::json!({
                "poly": format!("{:#x}", record.poly),
                "dir": dir_str,
                "init": format!("{:#x}", record.init),
                "post": format!("{:#x}", record.post),
                "witness_counts": record.witnesses.iter().map(Vec::len).collect::<Vec<_>>(),
            })
        );
    }

    Ok(())
}
