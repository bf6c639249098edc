use super::ClientHandler;
use crate::error::{Result, SubmissionError};
use crate::session::{Credentials, KeyboardPrompt};
use kmcx_core::config::{AuthMethod, ClusterTarget};
use russh::client::{AuthResult, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::PrivateKeyWithHashAlg;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
enum AuthDecision {
    Success,
    KeyboardInteractive,
    Failure,
}

fn auth_decision(result: AuthResult) -> AuthDecision {
    match result {
        AuthResult::Success => AuthDecision::Success,
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } if partial_success
            && remaining_methods.contains(&russh::MethodKind::KeyboardInteractive) =>
        {
            AuthDecision::KeyboardInteractive
        }
        AuthResult::Failure { .. } => AuthDecision::Failure,
    }
}

/// Answers a challenge whose prompts all ask for the password.
fn answer_with_password(prompts: &[KeyboardPrompt], password: Option<&str>) -> Option<Vec<String>> {
    let password = password?;
    if prompts.is_empty() {
        return Some(Vec::new());
    }
    prompts
        .iter()
        .map(|p| {
            (!p.echo && p.text.to_lowercase().contains("password")).then(|| password.to_string())
        })
        .collect()
}

/// Tries each offered method in configured order until one succeeds.
pub(super) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    target: &ClusterTarget,
    credentials: &Credentials,
) -> Result<()> {
    let failed = || SubmissionError::Authentication {
        user: target.username.clone(),
        host: target.host.clone(),
    };
    let transport = |e: russh::Error| SubmissionError::connection(&target.host, e);

    for method in &credentials.methods {
        let decision = match method {
            AuthMethod::PublicKey => {
                let Some(path) = &credentials.identity_file else {
                    tracing::debug!("No identity file configured, skipping public key");
                    continue;
                };
                let key = match russh::keys::load_secret_key(path, None) {
                    Ok(key) => key,
                    Err(e) => {
                        tracing::warn!("Failed to load key {}: {}", path.display(), e);
                        continue;
                    }
                };
                let hash = handle.best_supported_rsa_hash().await.map_err(transport)?;
                let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash.flatten());
                let result = handle
                    .authenticate_publickey(target.username.clone(), key)
                    .await
                    .map_err(transport)?;
                auth_decision(result)
            }
            AuthMethod::Password => {
                let Some(password) = &credentials.password else {
                    continue;
                };
                let result = handle
                    .authenticate_password(target.username.clone(), password.clone())
                    .await
                    .map_err(transport)?;
                auth_decision(result)
            }
            AuthMethod::KeyboardInteractive => AuthDecision::KeyboardInteractive,
        };

        match decision {
            AuthDecision::Success => return Ok(()),
            AuthDecision::KeyboardInteractive => {
                if keyboard_interactive(handle, target, credentials).await? {
                    return Ok(());
                }
            }
            AuthDecision::Failure => {
                tracing::debug!("Authentication method {} rejected", method);
            }
        }
    }
    Err(failed())
}

async fn keyboard_interactive(
    handle: &mut Handle<ClientHandler>,
    target: &ClusterTarget,
    credentials: &Credentials,
) -> Result<bool> {
    let transport = |e: russh::Error| SubmissionError::connection(&target.host, e);
    let mut response = handle
        .authenticate_keyboard_interactive_start(target.username.clone(), None::<String>)
        .await
        .map_err(transport)?;

    loop {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure {
                remaining_methods,
                partial_success,
            } => {
                tracing::debug!(
                    "keyboard-interactive failed (partial_success={}, remaining={:?})",
                    partial_success,
                    remaining_methods
                );
                return Ok(false);
            }
            KeyboardInteractiveAuthResponse::InfoRequest {
                name,
                instructions,
                prompts,
            } => {
                let prompts: Vec<KeyboardPrompt> = prompts
                    .into_iter()
                    .map(|p| KeyboardPrompt {
                        text: p.prompt,
                        echo: p.echo,
                    })
                    .collect();
                let answers = answer_with_password(&prompts, credentials.password.as_deref())
                    .or_else(|| {
                        credentials
                            .prompter
                            .as_ref()
                            .and_then(|p| p.respond(&name, &instructions, &prompts))
                    });
                let Some(answers) = answers else {
                    return Ok(false);
                };
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .map_err(transport)?;
            }
        }
    }
}
