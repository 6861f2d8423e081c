use git2::{Error, ObjectType, Repository, Signature};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::branches::resolve_commit;

pub fn tag_exists_in<P: AsRef<Path>>(repo_path: P, tag: &str) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    match repo.find_reference(&format!("refs/tags/{tag}")) {
        Ok(_) => Ok(true),
        Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagSettings {
    pub sign: bool,
    pub signing_key: Option<String>,
}

/// Create an annotated tag `name` on `target`, GPG-signed when requested.
pub fn create_annotated_tag_in<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    target: &str,
    message: &str,
    settings: &TagSettings,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let commit = resolve_commit(&repo, target)?;
    let sig = repo
        .signature()
        .or_else(|_| Signature::now("git-flow", "git-flow@localhost"))?;

    let mut message = message.trim_end().to_string();
    message.push('\n');

    if !settings.sign {
        repo.tag(name, commit.as_object(), &sig, &message, false)?;
        return Ok(());
    }

    let mut payload = format!(
        "object {}\ntype commit\ntag {name}\ntagger {}\n\n{message}",
        commit.id(),
        format_signature(&sig)
    );
    let signature = gpg_sign(&repo, &payload, settings.signing_key.as_deref())?;
    payload.push_str(&signature);

    let oid = repo.odb()?.write(ObjectType::Tag, payload.as_bytes())?;
    repo.reference(
        &format!("refs/tags/{name}"),
        oid,
        false,
        &format!("tag: {name}"),
    )?;
    Ok(())
}

fn format_signature(sig: &Signature<'_>) -> String {
    let when = sig.when();
    let offset = when.offset_minutes();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "{} <{}> {} {sign}{:02}{:02}",
        sig.name().unwrap_or("git-flow"),
        sig.email().unwrap_or(""),
        when.seconds(),
        offset / 60,
        offset % 60
    )
}

fn gpg_sign(repo: &Repository, payload: &str, key: Option<&str>) -> Result<String, Error> {
    let program = repo
        .config()
        .ok()
        .and_then(|cfg| cfg.get_string("gpg.program").ok())
        .unwrap_or_else(|| "gpg".to_string());

    let mut command = Command::new(&program);
    command.args(["--status-fd=2", "-bsa"]);
    if let Some(key) = key {
        command.args(["-u", key]);
    }
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| Error::from_str(&format!("failed to run {program}: {err}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(payload.as_bytes())
            .map_err(|err| Error::from_str(&format!("failed to write to {program}: {err}")))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|err| Error::from_str(&format!("failed to wait for {program}: {err}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::from_str(&format!(
            "{program} failed to sign the tag: {}",
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| Error::from_str("gpg produced a non UTF-8 signature"))
}
