//! Integration tests for the kiln REPL.
//!
//! Scripts run against the in-memory demo remote.

use std::sync::Arc;

use kiln_repl::{DEMO_OWNER, DEMO_REPO, Repl, demo_remote, starter_editor, starter_workspace};
use kiln_sync::{GitRemote, MemoryRemote, SyncConfig, SyncSession};
use kiln_vfs::{FileStore, MemoryStore};

async fn fresh_repl() -> (Repl, Arc<MemoryRemote>) {
    let remote = demo_remote().await.unwrap();
    let session = SyncSession::with_workspace(remote.clone(), SyncConfig::default(), starter_workspace().unwrap());
    (Repl::new(session, starter_editor()), remote)
}

/// Run lines through the REPL and collect outputs, errors included.
async fn run_script(repl: &mut Repl, script: &str) -> Vec<String> {
    let mut outputs = Vec::new();
    for line in script.lines() {
        match repl.process_line(line).await {
            Ok(Some(output)) => outputs.push(output),
            Ok(None) => {}
            Err(e) => outputs.push(format!("ERROR: {e:#}")),
        }
    }
    outputs
}

fn joined(outputs: &[String]) -> String {
    outputs.join("\n")
}

#[tokio::test]
async fn file_commands_edit_the_workspace() {
    let (mut repl, _) = fresh_repl().await;
    let out = run_script(
        &mut repl,
        r#"
        write /notes/todo.md first\nsecond
        cat /notes/todo.md
        mkdir /assets
        rm /script.js
        ls /notes
        "#,
    )
    .await;

    assert_eq!(out, vec!["first\nsecond".to_string(), "/notes/todo.md".to_string()]);
    let vfs = repl.session().workspace().vfs();
    assert!(!vfs.contains("/script.js"));
    assert!(vfs.contains("/assets/.placeholder"));
    assert_eq!(repl.editor().active_file.as_deref(), Some("/notes/todo.md"));
}

#[tokio::test]
async fn tree_hides_placeholders() {
    let (mut repl, _) = fresh_repl().await;
    let out = run_script(&mut repl, "tree").await;
    let tree = joined(&out);
    assert!(tree.contains("templates/"));
    assert!(!tree.contains(".placeholder"));
}

#[tokio::test]
async fn undo_steps_back() {
    let (mut repl, _) = fresh_repl().await;
    let out = run_script(
        &mut repl,
        "
        write /a.txt one
        write /a.txt two
        undo
        cat /a.txt
        undo
        undo
        undo
        ",
    )
    .await;
    assert_eq!(out[0], "undone");
    assert_eq!(out[1], "one");
    assert_eq!(out[2], "undone");
    // Back at the starter state.
    assert_eq!(out.last().map(String::as_str), Some("nothing to undo"));
    assert!(!repl.session().workspace().vfs().contains("/a.txt"));
}

#[tokio::test]
async fn load_edit_commit_cycle() {
    let (mut repl, remote) = fresh_repl().await;
    let out = run_script(
        &mut repl,
        "
        load demo/sandbox
        status
        write /index.html <h1>changed</h1>
        write /extra.txt more
        rm /instructions.md
        status
        diff /index.html
        commit Update page
        status
        ",
    )
    .await;
    let text = joined(&out);

    assert!(out[0].starts_with("loaded 5 files from demo/sandbox@main"), "{}", out[0]);
    assert!(out[1].ends_with("nothing to commit"));
    assert!(out[2].contains("A /extra.txt"));
    assert!(out[2].contains("M /index.html"));
    assert!(out[2].contains("D /instructions.md"));
    assert!(out[3].contains("+<h1>changed</h1>"));
    assert!(out[4].starts_with("committed "), "{text}");
    assert!(out[4].contains("(2 uploaded, 1 deleted)"));
    assert!(out[5].ends_with("nothing to commit"));

    assert_eq!(
        remote
            .read_file(DEMO_OWNER, DEMO_REPO, "main", "/extra.txt")
            .await
            .as_deref(),
        Some("more")
    );
}

#[tokio::test]
async fn load_count_ignores_placeholders() {
    let (mut repl, remote) = fresh_repl().await;
    let head = remote
        .push_files(DEMO_OWNER, DEMO_REPO, "main", [("assets/.placeholder", "")])
        .await
        .unwrap();

    let out = run_script(&mut repl, "load demo/sandbox\ntree").await;
    assert_eq!(out[0], format!("loaded 5 files from demo/sandbox@main ({})", &head[..7]));
    assert!(out[1].contains("assets/"));
}

#[tokio::test]
async fn conflicting_commit_suggests_reload() {
    let (mut repl, remote) = fresh_repl().await;
    run_script(&mut repl, "load demo/sandbox\nwrite /a.txt mine").await;
    remote
        .push_before_next_ref_update(DEMO_OWNER, DEMO_REPO, "main", [("b.txt", "theirs")])
        .await
        .unwrap();

    let out = run_script(&mut repl, "commit mine").await;
    let text = joined(&out);
    assert!(text.starts_with("ERROR: branch main moved on the remote"), "{text}");
    assert!(text.contains("load demo/sandbox@main"));

    let out = run_script(&mut repl, "load demo/sandbox@main\ncat /b.txt").await;
    assert_eq!(out[1], "theirs");
}

#[tokio::test]
async fn apply_reports_rejections() {
    let (mut repl, _) = fresh_repl().await;
    let out = run_script(
        &mut repl,
        r#"apply [{"action":"create","path":"/x.js","content":"x"},{"action":"delete","path":"/nope.js"}]"#,
    )
    .await;
    assert!(out[0].starts_with("applied 1 of 2 changes"));
    assert!(out[0].contains("rejected #1 /nope.js"));
    assert!(repl.session().workspace().vfs().contains("/x.js"));
}

#[tokio::test]
async fn remote_queries() {
    let (mut repl, remote) = fresh_repl().await;
    let out = run_script(&mut repl, "whoami\nrepos\nbranches demo/sandbox").await;
    assert_eq!(out[0], "demo");
    assert_eq!(out[1], "demo/sandbox");
    assert!(out[2].ends_with("  main"));
    assert_eq!(remote.list_repos().await.unwrap().len(), 1);
}

#[tokio::test]
async fn errors_are_reported() {
    let (mut repl, _) = fresh_repl().await;
    let out = run_script(
        &mut repl,
        "
        frobnicate
        cat /missing.txt
        diff
        commit nothing
        load not-a-spec
        ",
    )
    .await;
    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|o| o.starts_with("ERROR: ")), "{out:?}");
    assert!(out[0].contains("unknown command"));
    assert!(out[3].contains("not connected"));
}

#[tokio::test]
async fn quit_sets_exit_flag() {
    let (mut repl, _) = fresh_repl().await;
    assert!(!repl.exit_requested());
    run_script(&mut repl, "/help\n/quit").await;
    assert!(repl.exit_requested());
}

#[tokio::test]
async fn workspace_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let remote: Arc<dyn GitRemote> = demo_remote().await.unwrap();

    let mut repl = Repl::open(remote.clone(), SyncConfig::default(), &store).await.unwrap();
    run_script(&mut repl, "write /kept.txt hello").await;
    repl.save(&store).await.unwrap();

    let mut reopened = Repl::open(remote, SyncConfig::default(), &store).await.unwrap();
    let out = run_script(&mut reopened, "cat /kept.txt\nstatus").await;
    assert_eq!(out[0], "hello");
    assert!(out[1].starts_with("not connected"));
    assert_eq!(reopened.editor().active_file.as_deref(), Some("/kept.txt"));
}

#[tokio::test]
async fn open_without_cache_uses_starter() {
    let store = MemoryStore::new();
    let remote: Arc<dyn GitRemote> = demo_remote().await.unwrap();
    let repl = Repl::open(remote, SyncConfig::default(), &store).await.unwrap();
    assert!(repl.session().workspace().vfs().contains("/README.md"));
    assert_eq!(repl.editor(), &starter_editor());
}
