// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control collaborators.
//!
//! Deja never manages history itself. It only needs two things from a
//! version control system: materialize a working copy of a remote at some
//! path, and bring an existing working copy up to date. The [`Vcs`] trait
//! captures exactly that, so the store can be driven by libgit2, by the git
//! binary, or by a fake in tests.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Layer of indirection for version control access.
pub trait Vcs {
    /// Materialize full working copy of source location at destination.
    fn clone_to(&self, source: &str, destination: &Path) -> Result<()>;

    /// Bring existing working copy up to date with its remote.
    fn pull(&self, repository: &Path) -> Result<()>;
}

impl<V> Vcs for Box<V>
where
    V: Vcs + ?Sized,
{
    fn clone_to(&self, source: &str, destination: &Path) -> Result<()> {
        (**self).clone_to(source, destination)
    }

    fn pull(&self, repository: &Path) -> Result<()> {
        (**self).pull(repository)
    }
}

/// Version control access through libgit2.
///
/// Shows progress of network transfers through a progress bar, and prompts
/// for credentials when a remote asks for them.
#[derive(Debug, Clone)]
pub struct Git2Vcs {
    show_progress: bool,
}

impl Git2Vcs {
    /// Construct new libgit2 backend that reports progress.
    pub fn new() -> Self {
        Self {
            show_progress: true,
        }
    }

    /// Construct new libgit2 backend without any progress output.
    pub fn quiet() -> Self {
        Self {
            show_progress: false,
        }
    }

    fn progress_bar(&self, message: impl Into<String>) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));

        Ok(bar)
    }
}

impl Default for Git2Vcs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vcs for Git2Vcs {
    /// Clone remote repository into destination.
    ///
    /// If any credentials are required for the clone to continue, then the
    /// user will be prompted for that information accordingly. The progress
    /// bar will be blocked for user input.
    #[instrument(skip(self), level = "debug")]
    fn clone_to(&self, source: &str, destination: &Path) -> Result<()> {
        info!("clone {source:?} into {:?}", destination.display());
        let bar = self.progress_bar(source)?;
        let prompter = IndicatifPrompter::new(bar);
        let config = Config::open_default()?;
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());

        let mut throttle = Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            if throttle.elapsed() > Duration::from_millis(10) {
                throttle = Instant::now();
                prompter.bar.set_length(stats.total_objects() as u64);
                prompter.bar.set_position(stats.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = RepoBuilder::new().fetch_options(fo).clone(source, destination);
        prompter.bar.finish_and_clear();
        result?;

        Ok(())
    }

    /// Fetch current branch from origin, and fast-forward to it.
    #[instrument(skip(self), level = "debug")]
    fn pull(&self, repository: &Path) -> Result<()> {
        let repo = Repository::open(repository)?;
        let head = repo.head()?;
        if !head.is_branch() {
            return Err(VcsError::DetachedHead);
        }
        let branch = head.shorthand().ok_or(VcsError::DetachedHead)?.to_string();
        info!("pull {branch:?} into {:?}", repository.display());

        let bar = self.progress_bar(format!("{} ({branch})", repository.display()))?;
        let prompter = IndicatifPrompter::new(bar);
        let config = repo.config()?;
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());

        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            prompter.bar.set_length(progress.total_objects() as u64);
            prompter.bar.set_position(progress.received_objects() as u64);
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let mut remote = repo.find_remote("origin")?;
        let fetched = remote.fetch(&[branch.as_str()], Some(&mut fo), None);
        prompter.bar.finish_and_clear();
        fetched?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            debug!("{:?} already up to date", repository.display());
            return Ok(());
        }

        if !analysis.is_fast_forward() {
            return Err(VcsError::NonFastForward(branch));
        }

        let refname = format!("refs/heads/{branch}");
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(fetch_commit.id(), "deja: fast-forward")?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))?;

        Ok(())
    }
}

/// Version control access through the git binary.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
}

impl GitCommand {
    /// Construct new git binary backend using given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Vcs for GitCommand {
    #[instrument(skip(self), level = "debug")]
    fn clone_to(&self, source: &str, destination: &Path) -> Result<()> {
        let output = syscall_non_interactive(
            &self.program,
            [OsStr::new("clone"), OsStr::new(source), destination.as_os_str()],
        )?;
        debug!("{output}");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self, repository: &Path) -> Result<()> {
        let output = syscall_non_interactive(
            &self.program,
            [
                OsStr::new("-C"),
                repository.as_os_str(),
                OsStr::new("pull"),
                OsStr::new("--ff-only"),
            ],
        )?;
        debug!("{output}");

        Ok(())
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(VcsError::Syscall {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            message,
        });
    }

    Ok(message)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// External program could not be spawned.
    #[error(transparent)]
    Spawn(#[from] std::io::Error),

    /// External program exited unsuccessfully.
    #[error("command {program:?} failed:\n{message}")]
    Syscall { program: String, message: String },

    /// Local branch diverged from its remote counterpart.
    #[error("branch {0:?} cannot be fast-forwarded")]
    NonFastForward(String),

    /// Client claimed success, but left no working copy behind.
    #[error("nothing materialized at {:?}", .0.display())]
    NotMaterialized(std::path::PathBuf),

    /// Working copy is not on any branch.
    #[error("HEAD is detached, nothing to pull into")]
    DetachedHead,

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;

    #[test]
    fn git_command_reports_missing_program() {
        let git = GitCommand::new("deja-no-such-git-binary");
        let result = git.clone_to("mcantelon/dotfiles", Path::new("dotfiles"));
        assert!(matches!(result, Err(VcsError::Spawn(_))));
    }

    #[sealed_test]
    fn git2_pull_outside_repository_fails() {
        let cwd = std::env::current_dir().unwrap();
        let result = Git2Vcs::quiet().pull(&cwd.join("nothing-here"));
        assert!(matches!(result, Err(VcsError::Git2(_))));
    }

    #[sealed_test]
    fn git2_clone_of_missing_source_fails() {
        let cwd = std::env::current_dir().unwrap();
        let result = Git2Vcs::quiet().clone_to(
            cwd.join("no-such-source").to_string_lossy().as_ref(),
            &cwd.join("dest"),
        );
        assert!(result.is_err());
    }
}
