/// How the target program should be invoked, as distinguished by sudo's `-i`/`-s`
/// command-line flags. Determines which shell `resolve_shell` picks and how the
/// decision assembler (C9) rewrites `argv[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchType {
    /// Run the command directly; this is the default.
    Direct,
    /// `-s`: run the current user's shell, with `argv[0]` left alone.
    Shell,
    /// `-i`: run the target user's login shell, with `argv[0]` rewritten to `-shellname`.
    Login,
}
