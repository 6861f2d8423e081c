use git2::build::CheckoutBuilder;
use git2::{BranchType, Commit, Error, ErrorCode, Repository};
use std::path::Path;

/// Resolve a start point: a local branch first, then any revision git understands.
pub(crate) fn resolve_commit<'repo>(
    repo: &'repo Repository,
    spec: &str,
) -> Result<Commit<'repo>, Error> {
    match repo.find_branch(spec, BranchType::Local) {
        Ok(branch) => branch.into_reference().peel_to_commit(),
        Err(err) if matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
            repo.revparse_single(spec)?.peel_to_commit()
        }
        Err(err) => Err(err),
    }
}

pub(crate) fn branch_exists_impl(repo: &Repository, name: &str) -> Result<bool, Error> {
    match repo.find_branch(name, BranchType::Local) {
        Ok(_) => Ok(true),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn branch_exists_in<P: AsRef<Path>>(repo_path: P, name: &str) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    branch_exists_impl(&repo, name)
}

pub fn remote_branch_exists_in<P: AsRef<Path>>(
    repo_path: P,
    remote: &str,
    name: &str,
) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    match repo.find_branch(&format!("{remote}/{name}"), BranchType::Remote) {
        Ok(_) => Ok(true),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Local branch names, sorted.
pub fn list_local_branches_in<P: AsRef<Path>>(repo_path: P) -> Result<Vec<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let mut names = Vec::new();
    for entry in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = entry?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn create_branch_from_in<P: AsRef<Path>>(
    repo_path: P,
    base: &str,
    new_branch: &str,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let commit = resolve_commit(&repo, base)?;
    repo.branch(new_branch, &commit, false)?;
    Ok(())
}

/// Create `name` at `<remote>/<name>` and make it track that branch.
pub fn create_tracking_branch_in<P: AsRef<Path>>(
    repo_path: P,
    remote: &str,
    name: &str,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let upstream = format!("{remote}/{name}");
    let commit = repo
        .find_branch(&upstream, BranchType::Remote)?
        .into_reference()
        .peel_to_commit()?;
    let mut branch = repo.branch(name, &commit, false)?;
    branch.set_upstream(Some(&upstream))
}

pub fn set_upstream_in<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    remote: &str,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut branch = repo.find_branch(name, BranchType::Local)?;
    branch.set_upstream(Some(&format!("{remote}/{name}")))
}

/// Delete a local branch. Without `force` the branch must be merged into HEAD. A branch that is
/// already gone is not an error.
pub fn delete_branch_in<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    force: bool,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut branch = match repo.find_branch(name, BranchType::Local) {
        Ok(branch) => branch,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if !force {
        let tip = branch.get().peel_to_commit()?.id();
        let head = repo.head()?.peel_to_commit()?.id();
        if tip != head && !repo.graph_descendant_of(head, tip)? {
            return Err(Error::from_str(&format!(
                "branch `{name}` is not fully merged into HEAD"
            )));
        }
    }

    branch.delete()
}

pub(crate) fn checkout_branch_impl(repo: &Repository, name: &str) -> Result<(), Error> {
    let reference = repo.find_branch(name, BranchType::Local)?.into_reference();
    let target_ref = reference
        .name()
        .ok_or_else(|| Error::from_str("branch reference is not valid UTF-8"))?
        .to_string();
    let commit = reference.peel_to_commit()?;

    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head(&target_ref)
}

pub fn checkout_branch_in<P: AsRef<Path>>(repo_path: P, name: &str) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    checkout_branch_impl(&repo, name)
}

pub(crate) fn current_branch_impl(repo: &Repository) -> Result<Option<String>, Error> {
    let head = repo.find_reference("HEAD")?;
    let Some(target) = head.symbolic_target() else {
        return Ok(None);
    };
    Ok(target
        .strip_prefix("refs/heads/")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string()))
}

/// The checked-out branch, including an unborn one; `None` when HEAD is detached.
pub fn current_branch_name_in<P: AsRef<Path>>(repo_path: P) -> Result<Option<String>, Error> {
    let repo = Repository::open(repo_path)?;
    current_branch_impl(&repo)
}

pub fn rename_branch_in<P: AsRef<Path>>(repo_path: P, from: &str, to: &str) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut branch = repo.find_branch(from, BranchType::Local)?;
    branch.rename(to, false)?;
    Ok(())
}

pub(crate) fn is_merged_impl(repo: &Repository, branch: &str, target: &str) -> Result<bool, Error> {
    let tip = resolve_commit(repo, branch)?.id();
    let base = resolve_commit(repo, target)?.id();
    Ok(tip == base || repo.graph_descendant_of(base, tip)?)
}

/// Whether every commit of `branch` is reachable from `target`.
pub fn is_merged_into_in<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    target: &str,
) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    is_merged_impl(&repo, branch, target)
}

/// Whether HEAD points at a branch with no commits yet.
pub fn head_is_unborn_in<P: AsRef<Path>>(repo_path: P) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    match repo.head() {
        Ok(_) => Ok(false),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(true),
        Err(err) => Err(err),
    }
}

/// Point HEAD at `branch` and give it an empty initial commit.
pub fn create_root_commit_in<P: AsRef<Path>>(repo_path: P, branch: &str) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let refname = format!("refs/heads/{branch}");
    repo.set_head(&refname)?;
    let tree_id = repo.index()?.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = super::merge::signature(&repo)?;
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])?;
    Ok(())
}
