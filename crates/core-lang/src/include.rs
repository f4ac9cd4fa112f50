//! `INCLUDE` inlining.
//!
//! Replaces every `Include` node with the statements of the named file,
//! compiled through the full pipeline (the included file gets its own line
//! map, so diagnostics cite lines inside that file). Each file is inlined at
//! most once per resolver instance, keyed by its upper-cased name, so mutual
//! includes terminate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ast::{Node, NodeKind, Program};
use crate::error::{CompileError, ErrorKind};

const MAX_INCLUDE_DEPTH: usize = 16;

pub struct IncludeResolver {
    base_path: PathBuf,
    seen: HashSet<String>,
    file_counter: u32,
}

impl IncludeResolver {
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
            seen: HashSet::new(),
            file_counter: 0,
        }
    }

    /// Resolve all includes in `program`, which came from `file` (used only
    /// in error citations).
    pub fn resolve_in(&mut self, program: Program, file: &str) -> Result<Program, CompileError> {
        let mut nodes = Vec::with_capacity(program.nodes.len());
        self.inline(program.nodes, &mut nodes, file, 0)?;
        Ok(Program { nodes })
    }

    pub fn resolve(&mut self, program: Program) -> Result<Program, CompileError> {
        self.resolve_in(program, "<script>")
    }

    fn inline(
        &mut self,
        nodes: Vec<Node>,
        out: &mut Vec<Node>,
        file: &str,
        depth: usize,
    ) -> Result<(), CompileError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(CompileError {
                file: file.to_string(),
                line: out.last().map(|n| n.line).unwrap_or(0),
                kind: ErrorKind::IncludeDepth(MAX_INCLUDE_DEPTH),
            });
        }
        for node in nodes {
            let NodeKind::Include(name) = &node.kind else {
                out.push(node);
                continue;
            };
            let name = name.trim_matches('"').to_string();
            let dedupe_key = name.to_ascii_uppercase();
            if !self.seen.insert(dedupe_key) {
                debug!(target: "lang.include", name = %name, "skipping repeated include");
                continue;
            }
            let path = self.locate(&name);
            let source = std::fs::read_to_string(&path).map_err(|e| CompileError {
                file: file.to_string(),
                line: node.line,
                kind: ErrorKind::IncludeRead {
                    name: name.clone(),
                    reason: e.to_string(),
                },
            })?;
            debug!(target: "lang.include", name = %name, path = %path.display(), "inlining");
            self.file_counter += 1;
            let prefix = format!("i{}_", self.file_counter);
            let included = crate::compile_source_seeded(&source, &name, &prefix)?;
            self.inline(included.nodes, out, &name, depth + 1)?;
        }
        Ok(())
    }

    fn locate(&self, name: &str) -> PathBuf {
        let raw = Path::new(name);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.base_path.join(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn compile(src: &str) -> Program {
        crate::compile_source(src, "main.ts").unwrap()
    }

    fn command_names(program: &Program) -> Vec<String> {
        program
            .nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Command { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn include_is_replaced_by_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.ts"), "echo \"from util\"\n").unwrap();
        let program = compile("send \"a\"\nINCLUDE \"util.ts\"\nsend \"b\"");
        let resolved = IncludeResolver::new(dir.path())
            .resolve_in(program, "main.ts")
            .unwrap();
        assert_eq!(command_names(&resolved), vec!["SEND", "ECHO", "SEND"]);
    }

    #[test]
    fn repeated_includes_are_deduplicated_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.ts"), "echo \"u\"\n").unwrap();
        let program = compile("INCLUDE \"util.ts\"\nINCLUDE \"UTIL.TS\"");
        let resolved = IncludeResolver::new(dir.path()).resolve(program).unwrap();
        assert_eq!(command_names(&resolved).len(), 1);
    }

    #[test]
    fn nested_includes_resolve_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "INCLUDE \"b.ts\"\necho \"a\"\n").unwrap();
        fs::write(dir.path().join("b.ts"), "echo \"b\"\n").unwrap();
        let program = compile("INCLUDE \"a.ts\"");
        let resolved = IncludeResolver::new(dir.path()).resolve(program).unwrap();
        assert_eq!(command_names(&resolved), vec!["ECHO", "ECHO"]);
    }

    #[test]
    fn missing_file_cites_the_include_line() {
        let dir = tempfile::tempdir().unwrap();
        let program = compile("send \"x\"\nINCLUDE \"nope.ts\"");
        let err = IncludeResolver::new(dir.path())
            .resolve_in(program, "main.ts")
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.file, "main.ts");
        assert!(matches!(err.kind, ErrorKind::IncludeRead { .. }));
    }

    #[test]
    fn mutually_including_files_terminate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.ts"), "INCLUDE \"y.ts\"\necho \"x\"\n").unwrap();
        fs::write(dir.path().join("y.ts"), "INCLUDE \"x.ts\"\necho \"y\"\n").unwrap();
        let program = compile("INCLUDE \"x.ts\"");
        let resolved = IncludeResolver::new(dir.path()).resolve(program).unwrap();
        assert_eq!(command_names(&resolved), vec!["ECHO", "ECHO"]);
    }

    #[test]
    fn control_flow_inside_includes_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cond.ts"),
            "IF 1 = 1\n  echo \"in\"\nEND\n",
        )
        .unwrap();
        let program = compile("INCLUDE \"cond.ts\"");
        let resolved = IncludeResolver::new(dir.path()).resolve(program).unwrap();
        assert!(command_names(&resolved).contains(&"BRANCH".to_string()));
    }
}
