//! Interactive credential prompt on stdin.

use std::future::Future;
use std::io::{BufRead, Write};
use std::pin::Pin;

use datasync_peer::Credentials;
use datasync_replicate::CredentialPrompt;

/// Asks the operator on the terminal.
pub struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn ask<'a>(
        &'a self,
        peer_address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, String>> + Send + 'a>> {
        let peer = peer_address.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let stdin = std::io::stdin();
                read_credentials(&mut stdin.lock(), &mut std::io::stderr(), &peer)
            })
            .await
            .map_err(|e| format!("prompt task failed: {e}"))?
        })
    }
}

fn read_credentials(
    input: &mut impl BufRead,
    output: &mut impl Write,
    peer: &str,
) -> Result<Credentials, String> {
    writeln!(output, "Store is new on {peer}; credentials are needed to create it.")
        .map_err(|e| e.to_string())?;
    let mut ask = |label: &str| -> Result<String, String> {
        write!(output, "{label}: ").map_err(|e| e.to_string())?;
        output.flush().map_err(|e| e.to_string())?;
        let mut line = String::new();
        let n = input.read_line(&mut line).map_err(|e| e.to_string())?;
        if n == 0 {
            return Err("no input".into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    };

    let username = ask("Username")?;
    if username.is_empty() {
        return Err("empty username".into());
    }
    let password = ask("Password")?;
    Ok(Credentials::new(username, password))
}
