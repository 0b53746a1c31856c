//! `sensly totp`: preview the code the client would send for a secret.

use serde::Serialize;

use sensly_core::totp;

use crate::cli::{GlobalOpts, TotpArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TotpCode {
    code: String,
    expires_in_secs: u64,
}

pub fn handle(args: &TotpArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let now = totp::unix_now();
    let code = totp::generate(&args.secret, now).map_err(|e| CliError::Validation {
        field: "secret".into(),
        reason: e.to_string(),
    })?;

    let result = TotpCode {
        code,
        expires_in_secs: totp::seconds_remaining(now),
    };
    let text = output::render(global.output, &result, |r| {
        format!("{} (expires in {}s)", r.code, r.expires_in_secs)
    })?;
    output::print_output(&text)
}
