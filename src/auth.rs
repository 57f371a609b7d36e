use anyhow::{Result, bail};
use std::io::{self, IsTerminal, Write};
use zeroize::Zeroizing;

pub fn read_password() -> Result<Zeroizing<String>> {
    //  stdin (Pipeline)
    //  echo "supersecret" | saltseal -e ./docs
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY), no echo
    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("No password provided")
}

/// Prompts for a 1-based folder number. `None` when the answer is not a
/// number at all.
pub fn read_choice(prompt: &str) -> Result<Option<usize>> {
    eprint!("{prompt}");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().parse().ok())
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
