//! kiln REPL: drive a workspace and its GitHub sync from the command line.
//!
//! One line is one command. File commands edit the in-memory workspace;
//! `load` and `commit` talk to the remote. The workspace is cached in the
//! key-value store on exit and restored on the next start.

mod starter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use kiln_sync::{GitRemote, GithubRemote, MemoryRemote, SyncConfig, SyncSession, pick_default_branch};
use kiln_vfs::{
    ChangeStatus, EditorState, FileStore, FileSystemChange, KeyValueStore, build_tree, is_placeholder,
    load_workspace, normalize, render_patch, render_tree, save_workspace,
};

pub use starter::{starter_editor, starter_workspace};

/// Owner of the demo repository served in offline mode.
pub const DEMO_OWNER: &str = "demo";
pub const DEMO_REPO: &str = "sandbox";

/// REPL state: the sync session plus editor-facing state.
pub struct Repl {
    session: SyncSession,
    editor: EditorState,
    exit_requested: bool,
}

impl Repl {
    pub fn new(session: SyncSession, editor: EditorState) -> Self {
        Self {
            session,
            editor,
            exit_requested: false,
        }
    }

    /// Restore the cached workspace from `store`, or start from the starter project.
    pub async fn open(remote: Arc<dyn GitRemote>, config: SyncConfig, store: &dyn KeyValueStore) -> Result<Self> {
        let (workspace, editor) = match load_workspace(store).await {
            Ok(Some(restored)) => restored,
            Ok(None) => (starter_workspace()?, starter_editor()),
            Err(e) => {
                tracing::warn!(error = %e, "cached workspace unreadable, starting fresh");
                (starter_workspace()?, starter_editor())
            }
        };
        let session = SyncSession::with_workspace(remote, config, workspace);
        Ok(Self::new(session, editor))
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    /// True once `/quit` has been entered.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Cache the workspace and editor state in `store`.
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        save_workspace(store, self.session.workspace(), self.editor.clone())
            .await
            .context("Failed to save workspace")
    }

    /// Process a single line of input.
    pub async fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        if trimmed.starts_with('/') {
            return self.handle_meta_command(trimmed);
        }

        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match command {
            "ls" => self.ls(rest),
            "tree" => Ok(Some(render_tree(&build_tree(self.session.workspace().vfs())))),
            "cat" => self.cat(rest),
            "write" => self.write(rest),
            "touch" => {
                let path = self.session.workspace_mut().create_file(required(rest, "touch <path>")?)?;
                self.open_file(&path);
                Ok(None)
            }
            "mkdir" => {
                self.session.workspace_mut().create_dir(required(rest, "mkdir <dir>")?)?;
                Ok(None)
            }
            "rm" => self.rm(rest),
            "undo" => Ok(Some(if self.session.workspace_mut().undo() {
                "undone".to_string()
            } else {
                "nothing to undo".to_string()
            })),
            "status" => Ok(Some(self.status())),
            "diff" => self.diff(rest),
            "apply" => self.apply(rest),
            "whoami" => {
                let user = self.session.current_user().await?;
                Ok(Some(user.login))
            }
            "repos" => {
                let repos = self.session.list_repos().await?;
                Ok(Some(lines(repos.iter().map(|r| r.full_name()))))
            }
            "branches" => {
                let (owner, repo, _) = parse_repo_spec(required(rest, "branches <owner/repo>")?)?;
                let branches = self.session.list_branches(&owner, &repo).await?;
                Ok(Some(lines(
                    branches.iter().map(|b| format!("{}  {}", short(&b.commit_sha), b.name)),
                )))
            }
            "load" => self.load(rest).await,
            "commit" => self.commit(rest).await,
            "disconnect" => {
                self.session.disconnect();
                Ok(Some("disconnected; files kept locally".to_string()))
            }
            other => bail!("unknown command: {other} (try /help)"),
        }
    }

    fn handle_meta_command(&mut self, cmd: &str) -> Result<Option<String>> {
        match cmd.split_whitespace().next().unwrap_or("") {
            "/quit" | "/q" | "/exit" => {
                self.exit_requested = true;
                Ok(None)
            }
            "/help" | "/h" | "/?" => Ok(Some(HELP_TEXT.to_string())),
            other => bail!("unknown meta command: {other}"),
        }
    }

    fn ls(&self, dir: &str) -> Result<Option<String>> {
        let dir = if dir.is_empty() { "/" } else { dir };
        let paths = self.session.workspace().vfs().list_dir(dir)?;
        Ok(Some(lines(paths.into_iter().filter(|p| !is_placeholder(p)))))
    }

    fn cat(&mut self, path: &str) -> Result<Option<String>> {
        let path = normalize(required(path, "cat <path>")?)?;
        let content = self.session.workspace().vfs().read(&path)?.to_string();
        self.open_file(&path);
        Ok(Some(content))
    }

    fn write(&mut self, rest: &str) -> Result<Option<String>> {
        let (path, text) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let path = required(path, "write <path> <text>")?;
        let content = text.replace("\\n", "\n");
        let path = self.session.workspace_mut().write_file(path, content)?;
        self.open_file(&path);
        Ok(None)
    }

    fn rm(&mut self, path: &str) -> Result<Option<String>> {
        let path = normalize(required(path, "rm <path>")?)?;
        self.session.workspace_mut().delete(&path)?;
        self.editor.open_files.retain(|p| *p != path);
        if self.editor.active_file.as_deref() == Some(path.as_str()) {
            self.editor.active_file = self.editor.open_files.first().cloned();
        }
        Ok(None)
    }

    fn status(&self) -> String {
        let workspace = self.session.workspace();
        let Some(remote) = self.session.remote_ref() else {
            return format!("not connected ({} files)", workspace.vfs().files_only().count());
        };

        let mut out = format!("{} at {}", remote.display_name(), short(&remote.head_commit_sha));
        let changes = workspace.changes();
        if changes.is_empty() {
            out.push_str("\nnothing to commit");
        }
        for change in changes {
            let marker = match change.status {
                ChangeStatus::Added => 'A',
                ChangeStatus::Modified => 'M',
                ChangeStatus::Deleted => 'D',
            };
            out.push_str(&format!("\n{marker} {}", change.path));
        }
        out
    }

    fn diff(&self, filter: &str) -> Result<Option<String>> {
        let workspace = self.session.workspace();
        let Some(baseline) = workspace.baseline() else {
            bail!("not connected; nothing to diff against");
        };
        let filter = if filter.is_empty() { None } else { Some(normalize(filter)?) };

        let patches: Vec<String> = workspace
            .changes()
            .into_iter()
            .filter(|c| filter.as_deref().is_none_or(|f| f == c.path))
            .map(|c| render_patch(&c.path, baseline.get(&c.path), workspace.vfs().get(&c.path)))
            .collect();
        if patches.is_empty() {
            return Ok(Some("no changes".to_string()));
        }
        Ok(Some(patches.concat().trim_end().to_string()))
    }

    fn apply(&mut self, json: &str) -> Result<Option<String>> {
        let batch: Vec<FileSystemChange> =
            serde_json::from_str(required(json, "apply <json array>")?).context("Invalid change batch")?;
        let report = self.session.workspace_mut().apply(&batch);

        let mut out = format!("applied {} of {} changes", report.applied.len(), batch.len());
        for rejected in &report.rejected {
            out.push_str(&format!(
                "\nrejected #{} {}: {}",
                rejected.index, rejected.change.path, rejected.error
            ));
        }
        Ok(Some(out))
    }

    async fn load(&mut self, spec: &str) -> Result<Option<String>> {
        let (owner, repo, branch) = parse_repo_spec(required(spec, "load <owner/repo>[@branch]")?)?;
        let branch = match branch {
            Some(branch) => branch,
            None => {
                let branches = self.session.list_branches(&owner, &repo).await?;
                match pick_default_branch(&branches) {
                    Some(b) => b.name.clone(),
                    None => bail!("{owner}/{repo} has no branches"),
                }
            }
        };

        let report = self.session.load(&owner, &repo, &branch).await?;
        self.editor = EditorState {
            preview_root: Some("/".into()),
            terminal_cwd: Some("/".into()),
            ..EditorState::default()
        };

        let head = self
            .session
            .remote_ref()
            .map(|r| short(&r.head_commit_sha).to_string())
            .unwrap_or_default();
        let mut out = format!(
            "loaded {} files from {owner}/{repo}@{branch} ({head})",
            self.session.workspace().vfs().files_only().count()
        );
        for path in &report.skipped {
            out.push_str(&format!("\nskipped (not text): {path}"));
        }
        for failed in &report.failed {
            out.push_str(&format!("\nfailed: {} ({})", failed.path, failed.reason));
        }
        if report.truncated {
            out.push_str("\nwarning: the remote truncated the tree; some files are missing");
        }
        Ok(Some(out))
    }

    async fn commit(&mut self, message: &str) -> Result<Option<String>> {
        let message = required(message, "commit <message>")?;
        let name = self
            .session
            .remote_ref()
            .map(|r| r.display_name())
            .unwrap_or_default();

        match self.session.commit(message).await {
            Ok(outcome) => {
                let mut out = format!(
                    "committed {} ({} uploaded, {} deleted)",
                    short(&outcome.commit_sha),
                    outcome.uploaded,
                    outcome.deleted
                );
                if !outcome.html_url.is_empty() {
                    out.push('\n');
                    out.push_str(&outcome.html_url);
                }
                Ok(Some(out))
            }
            Err(e) if e.is_conflict() => {
                bail!("{e}\nrun `load {name}` to pick up the remote changes (local edits will be replaced)")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Track `path` as the active file.
    fn open_file(&mut self, path: &str) {
        if !self.editor.open_files.iter().any(|p| p == path) {
            self.editor.open_files.push(path.to_string());
        }
        self.editor.active_file = Some(path.to_string());
    }
}

/// Split `owner/repo[@branch]`.
pub fn parse_repo_spec(spec: &str) -> Result<(String, String, Option<String>)> {
    let (repo_part, branch) = match spec.split_once('@') {
        Some((repo, branch)) if !branch.is_empty() => (repo, Some(branch.to_string())),
        Some(_) => bail!("empty branch name in {spec:?}"),
        None => (spec, None),
    };
    match repo_part.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string(), branch))
        }
        _ => bail!("expected owner/repo, got {spec:?}"),
    }
}

fn required<'a>(arg: &'a str, usage: &str) -> Result<&'a str> {
    if arg.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(arg)
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn lines<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

const HELP_TEXT: &str = r#"kiln: in-memory workspace with GitHub sync

Files:
  ls [dir]                  List files under a directory
  tree                      Show the directory tree
  cat <path>                Print a file
  write <path> <text>       Write a file (\n becomes a newline)
  touch <path>              Create an empty file
  mkdir <dir>               Create an empty directory
  rm <path>                 Delete a file
  undo                      Restore the previous state
  apply <json>              Apply a batch of {action, path, content} changes

Sync:
  whoami                    Show the authenticated user
  repos                     List your repositories
  branches <owner/repo>     List branches
  load <owner/repo>[@br]    Load a branch (default: main, master, or first)
  status                    Show changes against the loaded branch
  diff [path]               Show patches for changed files
  commit <message>          Push all changes as one commit
  disconnect                Keep files, forget the branch

Meta:
  /help, /h, /?             Show this help
  /quit, /q, /exit          Save and exit
"#;

/// How `run` wires up the remote and the cache.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use an in-memory remote with a demo repository instead of GitHub.
    pub offline: bool,
    /// Directory for the workspace cache. Defaults to the XDG data dir.
    pub store_dir: Option<PathBuf>,
    /// Ignore any cached workspace.
    pub fresh: bool,
}

/// In-memory remote holding `demo/sandbox` with the starter files.
pub async fn demo_remote() -> Result<Arc<MemoryRemote>> {
    let remote = Arc::new(MemoryRemote::new(DEMO_OWNER));
    let starter = starter_workspace()?;
    let files: Vec<(String, String)> = starter
        .vfs()
        .files_only()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect();
    remote.create_repo(DEMO_OWNER, DEMO_REPO, files).await?;
    Ok(remote)
}

/// Run the REPL.
pub fn run(options: RunOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let config = SyncConfig::load().context("Failed to load configuration")?;
    let remote: Arc<dyn GitRemote> = if options.offline {
        runtime.block_on(demo_remote())?
    } else {
        if config.token.is_none() {
            tracing::warn!("no GitHub token configured; set KILN_GITHUB_TOKEN or GITHUB_TOKEN");
        }
        Arc::new(GithubRemote::new(&config).context("Failed to create GitHub client")?)
    };

    let store = match options.store_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default_location(),
    };
    let mut repl = if options.fresh {
        let session = SyncSession::with_workspace(remote, config, starter_workspace()?);
        Repl::new(session, starter_editor())
    } else {
        runtime.block_on(Repl::open(remote, config, &store))?
    };
    tracing::debug!(store = %store.root().display(), "workspace cache");

    println!("kiln v{}", env!("CARGO_PKG_VERSION"));
    if options.offline {
        println!("Offline mode: try `load {DEMO_OWNER}/{DEMO_REPO}`.");
    }
    println!("Type /help for commands, /quit to exit.\n");

    let mut rl = DefaultEditor::new().context("Failed to create editor")?;
    let history_path = kiln_vfs::paths::history_file();
    // Missing history on first run is expected.
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = match repl.session().remote_ref() {
            Some(r) => format!("kiln {}> ", r.display_name()),
            None => "kiln> ".to_string(),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match runtime.block_on(repl.process_line(&line)) {
                    Ok(Some(output)) => println!("{output}"),
                    Ok(None) => {}
                    Err(e) => eprintln!("Error: {e:#}"),
                }
                if repl.exit_requested() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    runtime.block_on(repl.save(&store))?;

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}
