use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const SECRET_ENV: &str = "HASHNEST_SECRET";

pub fn read_secret() -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  HASHNEST_SECRET="hunter2" hashnest verify '$pbkdf2-sha256$...'
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        if !secret.is_empty() {
            return Ok(Zeroizing::new(secret));
        }
    }

    //  stdin (Pipeline)
    //  printf "%s" "$PW" | hashnest hash
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let secret = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    bail!("No password provided")
}

/// Like [`read_secret`], but asks twice when prompting on a terminal.
pub fn read_new_secret_with_confirmation() -> Result<Zeroizing<String>> {
    if std::env::var_os(SECRET_ENV).is_some() || !io::stdin().is_terminal() {
        return read_secret();
    }

    let first = Zeroizing::new(rpassword::prompt_password("New password: ")?);
    let second = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);

    if first.is_empty() {
        bail!("password cannot be empty");
    }

    if first != second {
        bail!("passwords do not match");
    }

    Ok(first)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
