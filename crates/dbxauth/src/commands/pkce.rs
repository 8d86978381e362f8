//! Pkce command - generate or check a verifier/challenge pair.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use dbxauth_oauth::PkceChallenge;

use super::Context;

/// Arguments for the pkce command.
#[derive(Args, Debug)]
pub struct PkceArgs {
    /// Derive the challenge for this verifier instead of generating one
    #[arg(long)]
    pub verifier: Option<String>,

    /// Check this challenge against the verifier (exit 1 on mismatch)
    #[arg(long, requires = "verifier")]
    pub check: Option<String>,
}

/// Run the pkce command.
pub async fn run(args: PkceArgs, ctx: &Context) -> Result<ExitCode> {
    let pair = match args.verifier {
        Some(verifier) => PkceChallenge::from_verifier(verifier),
        None => PkceChallenge::generate(),
    };

    let Some(expected) = args.check else {
        if ctx.json_output {
            let output = serde_json::json!({
                "code_verifier": pair.verifier,
                "code_challenge": pair.challenge,
                "code_challenge_method": "S256",
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("code_verifier:  {}", pair.verifier);
            println!("code_challenge: {}", pair.challenge);
        }
        return Ok(ExitCode::SUCCESS);
    };

    let matches = PkceChallenge::verify(&pair.verifier, &expected);
    if ctx.json_output {
        let output = serde_json::json!({
            "code_challenge": pair.challenge,
            "expected": expected,
            "matches": matches,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if matches {
        println!("Challenge matches verifier.");
    } else {
        println!("Challenge does NOT match verifier.");
        println!("  expected: {}", expected);
        println!("  computed: {}", pair.challenge);
    }

    Ok(if matches {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
