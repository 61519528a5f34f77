//! Human-readable names for AST/token types, used to build "expected ..." messages
//! when [`super::basic_parser::expect_nonterminal`] fails to find what it was looking
//! for. Kept as a separate module (rather than methods alongside each type) so that the
//! grammar definitions in `ast.rs`/`tokens.rs` aren't cluttered with presentation detail.

use super::ast::*;
use super::tokens::*;

/// A type that can name itself for use in a parse-error message.
pub trait UserFriendly {
    const DESCRIPTION: &'static str;
}

macro_rules! user_friendly {
    ($ty:ty, $desc:expr) => {
        impl UserFriendly for $ty {
            const DESCRIPTION: &'static str = $desc;
        }
    };
}

user_friendly!(Username, "a user name");
user_friendly!(Digits, "a number");
user_friendly!(Numeric, "a number");
user_friendly!(Hostname, "a host name");
user_friendly!(AliasName, "an alias name");
user_friendly!(Command, "a command");
user_friendly!(SimpleCommand, "a command path");
user_friendly!(DefaultName, "a Defaults setting name");
user_friendly!(EnvVar, "an environment variable name");
user_friendly!(StringParameter, "a value");
user_friendly!(QuotedText, "quoted text");
user_friendly!(QuotedInclude, "a quoted path");
user_friendly!(IncludePath, "a path");
user_friendly!(ChDir, "a directory, or '*'");

user_friendly!(Identifier, "a user name or #uid");
user_friendly!(UserSpecifier, "a user, group, or netgroup specifier");
user_friendly!(RunAs, "a runas specification");
user_friendly!(CommandSpec, "a command specification");
user_friendly!(
    (Option<RunAs>, CommandSpec),
    "a [runas] command specification"
);
user_friendly!(
    (SpecList<Hostname>, Vec<(Option<RunAs>, CommandSpec)>),
    "a host and command list"
);
user_friendly!(crate::defaults::SettingsModifier, "a Defaults setting");

/// `Unquoted<T>` only ever captures raw quoted text; the inner `T` it is later
/// re-parsed as doesn't change what a caller should be told was expected.
impl<T> UserFriendly for Unquoted<T> {
    const DESCRIPTION: &'static str = "quoted text";
}

/// `ALL`, an alias, or a `T`: name it after `T`, since that's what a reader is most
/// likely missing (`ALL`/aliases are the exceptional case, not the common one).
impl<T: UserFriendly> UserFriendly for Meta<T> {
    const DESCRIPTION: &'static str = T::DESCRIPTION;
}

/// Negation doesn't change what's expected, only whether it's allowed or forbidden.
impl<T: UserFriendly> UserFriendly for Qualified<T> {
    const DESCRIPTION: &'static str = T::DESCRIPTION;
}

/// A list of `T` is still asking for (at least one) `T`.
impl<T: UserFriendly> UserFriendly for Vec<T> {
    const DESCRIPTION: &'static str = T::DESCRIPTION;
}

/// An alias definition's right-hand side is a list of whatever it's an alias for.
impl<T: UserFriendly> UserFriendly for Def<T> {
    const DESCRIPTION: &'static str = T::DESCRIPTION;
}
