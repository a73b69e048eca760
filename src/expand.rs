//! 変数展開とチルダ展開。
//!
//! トークン単位の置換のみを行う（部分文字列中の `$VAR` は展開しない）。
//! 展開は新しいトークン列を返し、入力は変更しない。
//!
//! 順序: 変数展開 → チルダ展開。

use std::borrow::Cow;
use std::env;

/// 変数参照マーカー。
const VAR_MARKER: char = '$';
/// ホームディレクトリ参照マーカー。
const TILDE: char = '~';

/// トークン列全体に変数展開とチルダ展開を適用する。
///
/// `$HOME` が未設定なら、その行ではチルダ展開を行わない。
/// 空文字列に展開されたトークン（値が空の変数）は取り除く。
pub fn expand(tokens: &[String]) -> Vec<String> {
    let home = env::var("HOME").ok();
    tokens
        .iter()
        .map(|t| {
            let var_expanded = expand_var(t);
            match home.as_deref() {
                Some(h) => expand_tilde(&var_expanded, h).into_owned(),
                None => var_expanded.into_owned(),
            }
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// `$NAME` 形式のトークンを環境変数の値で丸ごと置換する。
///
/// 未定義（または非 UTF-8）の変数はトークンをそのまま残す。
pub fn expand_var(token: &str) -> Cow<'_, str> {
    let Some(name) = token.strip_prefix(VAR_MARKER) else {
        return Cow::Borrowed(token);
    };
    if name.is_empty() {
        return Cow::Borrowed(token);
    }
    match env::var(name) {
        Ok(value) => Cow::Owned(value),
        Err(_) => Cow::Borrowed(token),
    }
}

/// 先頭の `~` を `home` に置換する。`~` 単独か `~/...` のみが対象。
///
/// `~user` 形式や途中の `~` は変更しない。
pub fn expand_tilde<'a>(token: &'a str, home: &str) -> Cow<'a, str> {
    let Some(rest) = token.strip_prefix(TILDE) else {
        return Cow::Borrowed(token);
    };
    if rest.is_empty() || rest.starts_with('/') {
        Cow::Owned(format!("{}{}", home, rest))
    } else {
        Cow::Borrowed(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_set() {
        env::set_var("PASH_TEST_HOME_X", "/tmp/x");
        assert_eq!(expand_var("$PASH_TEST_HOME_X"), "/tmp/x");
        env::remove_var("PASH_TEST_HOME_X");
    }

    #[test]
    fn var_unset_left_literal() {
        env::remove_var("PASH_TEST_UNSET_XYZ");
        assert_eq!(expand_var("$PASH_TEST_UNSET_XYZ"), "$PASH_TEST_UNSET_XYZ");
    }

    #[test]
    fn var_bare_dollar() {
        assert!(matches!(expand_var("$"), Cow::Borrowed("$")));
    }

    #[test]
    fn var_not_leading() {
        env::set_var("PASH_TEST_MID", "v");
        assert!(matches!(expand_var("a$PASH_TEST_MID"), Cow::Borrowed(_)));
        env::remove_var("PASH_TEST_MID");
    }

    #[test]
    fn var_empty_value() {
        env::set_var("PASH_TEST_EMPTY", "");
        assert_eq!(expand_var("$PASH_TEST_EMPTY"), "");
        env::remove_var("PASH_TEST_EMPTY");
    }

    #[test]
    fn tilde_alone() {
        assert_eq!(expand_tilde("~", "/home/u"), "/home/u");
    }

    #[test]
    fn tilde_path() {
        assert_eq!(expand_tilde("~/sub", "/home/u"), "/home/u/sub");
    }

    #[test]
    fn tilde_trailing_slash_kept() {
        assert_eq!(expand_tilde("~/", "/home/u"), "/home/u/");
    }

    #[test]
    fn tilde_user_unchanged() {
        assert!(matches!(expand_tilde("~foo", "/home/u"), Cow::Borrowed("~foo")));
    }

    #[test]
    fn tilde_not_leading() {
        assert!(matches!(expand_tilde("a~/b", "/home/u"), Cow::Borrowed(_)));
    }

    #[test]
    fn expand_whole_line() {
        env::set_var("PASH_TEST_LINE", "value");
        let tokens: Vec<String> = ["echo", "$PASH_TEST_LINE", "plain"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(expand(&tokens), vec!["echo", "value", "plain"]);
        env::remove_var("PASH_TEST_LINE");
    }

    #[test]
    fn empty_expansion_dropped() {
        env::set_var("PASH_TEST_DROP", "");
        let tokens: Vec<String> = ["ls", "$PASH_TEST_DROP", "-l"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(expand(&tokens), vec!["ls", "-l"]);
        env::remove_var("PASH_TEST_DROP");
    }

    #[test]
    fn unset_home_disables_tilde() {
        let _guard = crate::test_env::lock();
        let saved = env::var_os("HOME");
        env::remove_var("HOME");
        let tokens = vec!["~".to_string(), "~/x".to_string()];
        let expanded = expand(&tokens);
        if let Some(home) = saved {
            env::set_var("HOME", home);
        }
        assert_eq!(expanded, vec!["~", "~/x"]);
    }

    #[test]
    fn var_then_tilde() {
        let _guard = crate::test_env::lock();
        let saved = env::var_os("HOME");
        env::set_var("HOME", "/home/pash_test");
        env::set_var("PASH_TEST_TILDE_VAL", "~/docs");
        let tokens = vec!["$PASH_TEST_TILDE_VAL".to_string()];
        let expanded = expand(&tokens);
        env::remove_var("PASH_TEST_TILDE_VAL");
        match saved {
            Some(home) => env::set_var("HOME", home),
            None => env::remove_var("HOME"),
        }
        assert_eq!(expanded, vec!["/home/pash_test/docs"]);
    }
}
