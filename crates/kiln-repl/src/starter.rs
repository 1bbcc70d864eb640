//! Files a brand-new workspace starts with.

use kiln_vfs::{EditorState, VfsError, Vfs, Workspace};

const README: &str = "# Sandbox\n\n\
Files live in memory until you `load` a GitHub branch and `commit` to it.\n\
Type `/help` in the REPL for the command list.\n";

const INDEX_HTML: &str = "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
  <meta charset=\"UTF-8\">\n\
  <title>Sandbox</title>\n\
  <link rel=\"stylesheet\" href=\"/style.css\">\n\
</head>\n\
<body>\n\
  <h1>Hello from the sandbox</h1>\n\
  <script src=\"/script.js\"></script>\n\
</body>\n\
</html>\n";

const STYLE_CSS: &str = "body {\n  font-family: sans-serif;\n  background: #111827;\n  color: #e5e7eb;\n}\n";

const SCRIPT_JS: &str = "// JavaScript goes here\n";

const INSTRUCTIONS_MD: &str = "# Instructions\n\nNotes for whoever edits this project next.\n";

/// The default project: a minimal web page plus an empty `templates` directory.
pub fn starter_workspace() -> Result<Workspace, VfsError> {
    let mut vfs = Vfs::from_files([
        ("/README.md", README),
        ("/index.html", INDEX_HTML),
        ("/style.css", STYLE_CSS),
        ("/script.js", SCRIPT_JS),
        ("/instructions.md", INSTRUCTIONS_MD),
    ])?;
    vfs.create_dir("/templates")?;
    Ok(Workspace::new(vfs))
}

/// Editor state matching [`starter_workspace`].
pub fn starter_editor() -> EditorState {
    EditorState {
        open_files: vec!["/README.md".into(), "/index.html".into()],
        active_file: Some("/README.md".into()),
        preview_root: Some("/".into()),
        terminal_cwd: Some("/".into()),
    }
}
