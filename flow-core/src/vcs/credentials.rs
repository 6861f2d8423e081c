//! Credentials for fetch and push.
//!
//! Sources are tried in a fixed order and each attempt is logged, so an authentication
//! failure can report what was tried. libgit2 re-invokes the callback after a rejected
//! credential; the log length tells us where to resume.

use std::cell::RefCell;
use std::env;
use std::path::PathBuf;
use std::rc::Rc;

use git2::{Config, Cred, CredentialType, Error, ErrorClass, ErrorCode, RemoteCallbacks, Repository};

const KEY_FILES: [&str; 2] = ["id_ed25519", "id_rsa"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Helper,
    SshAgent,
    KeyFile(&'static str),
    Username,
    Default,
}

impl CredentialSource {
    pub fn label(&self) -> String {
        match self {
            CredentialSource::Helper => "credential-helper".to_string(),
            CredentialSource::SshAgent => "ssh-agent".to_string(),
            CredentialSource::KeyFile(name) => format!("~/.ssh/{name}"),
            CredentialSource::Username => "username".to_string(),
            CredentialSource::Default => "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Accepted,
    Rejected(String),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAttempt {
    pub source: CredentialSource,
    pub result: AttemptResult,
}

pub(crate) type AttemptLog = Rc<RefCell<Vec<CredentialAttempt>>>;

/// Ordered sources worth trying for the credential types the remote accepts.
pub(crate) fn credential_plan(allowed: CredentialType, has_helper: bool) -> Vec<CredentialSource> {
    let mut plan = Vec::new();
    if has_helper && allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        plan.push(CredentialSource::Helper);
    }
    if allowed.contains(CredentialType::SSH_KEY) {
        plan.push(CredentialSource::SshAgent);
        plan.extend(KEY_FILES.map(CredentialSource::KeyFile));
    }
    if allowed.contains(CredentialType::USERNAME) {
        plan.push(CredentialSource::Username);
    }
    plan.push(CredentialSource::Default);
    plan
}

pub(crate) struct CredentialRequest<'a> {
    pub(crate) url: &'a str,
    pub(crate) username_from_url: Option<&'a str>,
}

impl CredentialRequest<'_> {
    fn username(&self) -> &str {
        self.username_from_url.unwrap_or("git")
    }
}

pub(crate) enum Lookup {
    Found(Cred),
    Rejected(String),
    Unavailable(String),
}

/// Produces one credential from one source.
pub(crate) trait CredentialLookup {
    fn lookup(&self, source: CredentialSource, request: &CredentialRequest<'_>) -> Lookup;
}

/// Try `plan` in order, appending every attempt to `log`.
pub(crate) fn walk_plan<L: CredentialLookup>(
    plan: &[CredentialSource],
    lookup: &L,
    request: &CredentialRequest<'_>,
    log: &mut Vec<CredentialAttempt>,
) -> Result<Cred, String> {
    let mut last_rejection = None;
    for source in plan {
        let result = match lookup.lookup(*source, request) {
            Lookup::Found(cred) => {
                log.push(CredentialAttempt {
                    source: *source,
                    result: AttemptResult::Accepted,
                });
                return Ok(cred);
            }
            Lookup::Rejected(reason) => {
                last_rejection = Some(reason.clone());
                AttemptResult::Rejected(reason)
            }
            Lookup::Unavailable(reason) => AttemptResult::Unavailable(reason),
        };
        log.push(CredentialAttempt {
            source: *source,
            result,
        });
    }
    Err(last_rejection.unwrap_or_else(|| "no credential source succeeded".to_string()))
}

pub(crate) fn tidy_message(err: &Error) -> String {
    err.message().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn home_dir() -> Option<PathBuf> {
    let home = env::var_os("HOME").filter(|home| !home.is_empty());
    #[cfg(windows)]
    let home = home.or_else(|| env::var_os("USERPROFILE").filter(|home| !home.is_empty()));
    home.map(PathBuf::from)
}

struct SystemLookup {
    config: Option<Rc<Config>>,
}

impl SystemLookup {
    fn key_file(&self, name: &str, request: &CredentialRequest<'_>) -> Lookup {
        let Some(private) = home_dir().map(|home| home.join(".ssh").join(name)) else {
            return Lookup::Unavailable("HOME is not set".to_string());
        };
        if !private.exists() {
            return Lookup::Unavailable(format!("no key at {}", private.display()));
        }
        let public = private.with_extension("pub");
        let public = public.exists().then_some(public);
        match Cred::ssh_key(request.username(), public.as_deref(), &private, None) {
            Ok(cred) => Lookup::Found(cred),
            Err(err) if err.class() == ErrorClass::Ssh && err.code() == ErrorCode::Auth => {
                Lookup::Rejected("key needs a passphrase or an ssh-agent session".to_string())
            }
            Err(err) => Lookup::Rejected(tidy_message(&err)),
        }
    }
}

impl CredentialLookup for SystemLookup {
    fn lookup(&self, source: CredentialSource, request: &CredentialRequest<'_>) -> Lookup {
        let found = match source {
            CredentialSource::Helper => {
                let Some(config) = self.config.as_ref() else {
                    return Lookup::Unavailable("git config is unavailable".to_string());
                };
                Cred::credential_helper(config, request.url, request.username_from_url)
            }
            CredentialSource::SshAgent => {
                if env::var_os("SSH_AUTH_SOCK").is_none() {
                    return Lookup::Unavailable("SSH_AUTH_SOCK is not set".to_string());
                }
                Cred::ssh_key_from_agent(request.username())
            }
            CredentialSource::KeyFile(name) => return self.key_file(name, request),
            CredentialSource::Username => Cred::username(request.username()),
            CredentialSource::Default => Cred::default(),
        };
        match found {
            Ok(cred) => Lookup::Found(cred),
            Err(err) => Lookup::Rejected(tidy_message(&err)),
        }
    }
}

/// Remote callbacks that authenticate from the plan and record attempts into `log`.
pub(crate) fn authenticating_callbacks<'cb>(
    repo: &Repository,
    log: AttemptLog,
) -> RemoteCallbacks<'cb> {
    let config = repo.config().ok().map(Rc::new);
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        let plan = credential_plan(allowed, config.is_some());
        let tried = log.borrow().len();
        let remaining = plan.get(tried..).unwrap_or_default();
        let lookup = SystemLookup {
            config: config.clone(),
        };
        let request = CredentialRequest {
            url,
            username_from_url,
        };

        let mut attempts = Vec::new();
        let outcome = walk_plan(remaining, &lookup, &request, &mut attempts);
        if let Ok(mut stored) = log.try_borrow_mut() {
            stored.extend(attempts);
        }
        outcome.map_err(|reason| Error::from_str(&reason))
    });
    callbacks
}
