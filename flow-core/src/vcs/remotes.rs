use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use git2::{BranchType, Error, ErrorCode, FetchOptions, PushOptions, Repository};

use super::credentials::{
    AttemptLog, AttemptResult, CredentialAttempt, authenticating_callbacks, tidy_message,
};

#[derive(Debug)]
pub enum RemoteErrorKind {
    General(String),
    Auth {
        remote: String,
        url: String,
        attempts: Vec<CredentialAttempt>,
    },
    /// Ref updates the remote refused, with its status text.
    Rejected(Vec<(String, String)>),
}

/// Failure talking to a remote.
#[derive(Debug)]
pub struct RemoteError {
    kind: RemoteErrorKind,
    source: Option<Error>,
}

impl RemoteError {
    fn from_git(context: &str, err: Error) -> Self {
        Self {
            kind: RemoteErrorKind::General(format!("{context}: {}", tidy_message(&err))),
            source: Some(err),
        }
    }

    pub fn kind(&self) -> &RemoteErrorKind {
        &self.kind
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RemoteErrorKind::General(message) => write!(f, "{message}"),
            RemoteErrorKind::Auth {
                remote,
                url,
                attempts,
            } => {
                write!(f, "authentication failed for {remote} ({url})")?;
                if !attempts.is_empty() {
                    let tried: Vec<String> =
                        attempts.iter().map(|attempt| attempt.source.label()).collect();
                    write!(f, "; tried {}", tried.join(", "))?;
                }
                Ok(())
            }
            RemoteErrorKind::Rejected(updates) => {
                let listed: Vec<String> = updates
                    .iter()
                    .map(|(name, status)| format!("{name} ({status})"))
                    .collect();
                write!(f, "remote rejected {}", listed.join(", "))
            }
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

fn new_log() -> AttemptLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Auth failures become [`RemoteErrorKind::Auth`] listing what was tried.
fn classify_failure(
    repo: &Repository,
    remote_name: &str,
    context: &str,
    err: Error,
    log: &AttemptLog,
) -> RemoteError {
    let attempts = log.borrow().clone();
    let nothing_accepted = !attempts.is_empty()
        && attempts
            .iter()
            .all(|attempt| attempt.result != AttemptResult::Accepted);
    if err.code() != ErrorCode::Auth && !nothing_accepted {
        return RemoteError::from_git(context, err);
    }

    let url = repo
        .find_remote(remote_name)
        .ok()
        .and_then(|remote| remote.url().map(str::to_string))
        .unwrap_or_default();
    RemoteError {
        kind: RemoteErrorKind::Auth {
            remote: remote_name.to_string(),
            url,
            attempts,
        },
        source: Some(err),
    }
}

/// Fetch `branches` (all heads when empty) into `refs/remotes/<remote>/`.
pub fn fetch_in<P: AsRef<Path>>(
    repo_path: P,
    remote_name: &str,
    branches: &[String],
) -> Result<(), RemoteError> {
    let repo = Repository::open(repo_path)
        .map_err(|err| RemoteError::from_git("failed to open git repository", err))?;
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|err| RemoteError::from_git("unable to locate remote", err))?;

    let refspecs: Vec<String> = if branches.is_empty() {
        vec![format!("+refs/heads/*:refs/remotes/{remote_name}/*")]
    } else {
        branches
            .iter()
            .map(|branch| format!("+refs/heads/{branch}:refs/remotes/{remote_name}/{branch}"))
            .collect()
    };

    let attempts = new_log();
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(authenticating_callbacks(&repo, Rc::clone(&attempts)));

    let mut result = remote.fetch(&refspecs, Some(&mut opts), None);
    if let Err(err) = &result
        && err.code() == ErrorCode::NotFound
        && !branches.is_empty()
    {
        // A branch missing on the remote fails the whole fetch; fall back to every head.
        let all = [format!("+refs/heads/*:refs/remotes/{remote_name}/*")];
        attempts.borrow_mut().clear();
        let mut retry = FetchOptions::new();
        retry.remote_callbacks(authenticating_callbacks(&repo, Rc::clone(&attempts)));
        result = remote.fetch(&all, Some(&mut retry), None);
    }

    result.map_err(|err| classify_failure(&repo, remote_name, "failed to fetch", err, &attempts))
}

/// Push `refspecs`, then mirror accepted updates into the remote-tracking refs.
pub fn push_refspecs_in<P: AsRef<Path>>(
    repo_path: P,
    remote_name: &str,
    refspecs: &[String],
    push_options: &[String],
) -> Result<(), RemoteError> {
    let repo = Repository::open(repo_path)
        .map_err(|err| RemoteError::from_git("failed to open git repository", err))?;
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|err| RemoteError::from_git("unable to locate remote", err))?;

    let attempts = new_log();
    let mut callbacks = authenticating_callbacks(&repo, Rc::clone(&attempts));
    let push_statuses: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let statuses_for_cb = Rc::clone(&push_statuses);
    callbacks.push_update_reference(move |refname, status| {
        if let Some(status) = status
            && let Ok(mut entries) = statuses_for_cb.try_borrow_mut()
        {
            entries.push((refname.to_string(), status.to_string()));
        }
        Ok(())
    });

    let option_refs: Vec<&str> = push_options.iter().map(String::as_str).collect();
    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);
    if !option_refs.is_empty() {
        opts.remote_push_options(&option_refs);
    }

    let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
    remote
        .push(&specs, Some(&mut opts))
        .map_err(|err| classify_failure(&repo, remote_name, "failed to push", err, &attempts))?;
    remote
        .disconnect()
        .map_err(|err| RemoteError::from_git("failed to disconnect remote", err))?;

    let statuses = push_statuses.borrow().clone();
    if !statuses.is_empty() {
        return Err(RemoteError {
            kind: RemoteErrorKind::Rejected(statuses),
            source: None,
        });
    }

    for spec in refspecs {
        update_tracking_ref(&repo, remote_name, spec)
            .map_err(|err| RemoteError::from_git("failed to update remote tracking ref", err))?;
    }
    Ok(())
}

fn update_tracking_ref(repo: &Repository, remote_name: &str, spec: &str) -> Result<(), Error> {
    let spec = spec.trim_start_matches('+');
    let Some((src, dst)) = spec.split_once(':') else {
        return Ok(());
    };
    let Some(branch) = dst.strip_prefix("refs/heads/") else {
        return Ok(());
    };
    let tracking = format!("refs/remotes/{remote_name}/{branch}");

    if src.is_empty() {
        return match repo.find_reference(&tracking) {
            Ok(mut reference) => reference.delete(),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
            Err(err) => Err(err),
        };
    }

    let oid = repo.revparse_single(src)?.peel_to_commit()?.id();
    repo.reference(&tracking, oid, true, "git-flow: update remote tracking ref after push")?;
    Ok(())
}

pub fn delete_remote_branch_in<P: AsRef<Path>>(
    repo_path: P,
    remote_name: &str,
    branch: &str,
    push_options: &[String],
) -> Result<(), RemoteError> {
    push_refspecs_in(
        repo_path,
        remote_name,
        &[format!(":refs/heads/{branch}")],
        push_options,
    )
}

/// Commits `branch` has that its tracking ref lacks, and the reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingCounts {
    pub ahead: usize,
    pub behind: usize,
    pub tracking: String,
}

/// Compare `branch` with its configured upstream, else `<remote>/<branch>`.
pub fn ahead_behind_in<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    remote_name: &str,
) -> Result<Option<TrackingCounts>, Error> {
    let repo = Repository::open(repo_path)?;
    let local = repo.find_branch(branch, BranchType::Local)?;
    let local_oid = local
        .get()
        .target()
        .ok_or_else(|| Error::from_str("branch does not reference a commit"))?;

    let upstream = match local.upstream() {
        Ok(upstream) => Some(upstream),
        Err(err) if err.code() == ErrorCode::NotFound => {
            match repo.find_branch(&format!("{remote_name}/{branch}"), BranchType::Remote) {
                Ok(remote_branch) => Some(remote_branch),
                Err(err) if err.code() == ErrorCode::NotFound => None,
                Err(err) => return Err(err),
            }
        }
        Err(err) => return Err(err),
    };
    let Some(upstream) = upstream else {
        return Ok(None);
    };

    let tracking = upstream
        .name()?
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("{remote_name}/{branch}"));
    let Some(upstream_oid) = upstream.get().target() else {
        return Ok(None);
    };

    let (ahead, behind) = repo.graph_ahead_behind(local_oid, upstream_oid)?;
    Ok(Some(TrackingCounts {
        ahead,
        behind,
        tracking,
    }))
}
