//! コマンドライン分割: 入力行をトークン列にし、バックグラウンド指定とパイプ区切りを識別する。
//!
//! クォート・エスケープ・glob は扱わない。トークナイザは空白区切りのみで、
//! 演算子（`|`, `<`, `>`, `&`）も空白で区切られた独立トークンとして認識する。
//!
//! - [`tokenize`]: 空白で分割（空トークンは生成しない）
//! - [`strip_background`]: 末尾の `&` を取り除き、バックグラウンド指定かを返す
//! - [`pipe_count`] / [`split_pipeline`]: `|` でセグメントに分割

use thiserror::Error;

/// パイプ区切りトークン。
pub const PIPE: &str = "|";
/// バックグラウンド実行トークン（行末のみ有効）。
pub const BACKGROUND: &str = "&";

/// コマンドライン分割時に発生しうるエラー。
#[derive(Debug, PartialEq, Error)]
pub enum ParseError {
    /// `|` の前後にコマンドがない（`| cmd`、`cmd |`、`a | | b`）。
    #[error("syntax error near unexpected token `|'")]
    EmptyPipelineSegment,
}

/// 入力行を空白で分割してトークン列を返す。
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// 末尾トークンが `&` なら取り除いて `true` を返す。
///
/// 途中の `&` は通常の引数として残す。
pub fn strip_background(mut tokens: Vec<String>) -> (Vec<String>, bool) {
    if tokens.last().map(String::as_str) == Some(BACKGROUND) {
        tokens.pop();
        (tokens, true)
    } else {
        (tokens, false)
    }
}

/// `|` トークンの個数。
pub fn pipe_count(tokens: &[String]) -> usize {
    tokens.iter().filter(|t| t.as_str() == PIPE).count()
}

/// トークン列を `|` の位置でセグメントに分割する。
///
/// `|` が 0 個なら全体が 1 セグメントになる。空セグメントはエラー。
pub fn split_pipeline(tokens: &[String]) -> Result<Vec<&[String]>, ParseError> {
    let segments: Vec<&[String]> = tokens.split(|t| t.as_str() == PIPE).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ParseError::EmptyPipelineSegment);
    }
    Ok(segments)
}

/// 表示用コマンド文字列（トークンを空白 1 つで連結）。
pub fn display_command(tokens: &[String]) -> String {
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        tokenize(s)
    }

    #[test]
    fn tokenize_simple() {
        assert_eq!(toks("ls -l /tmp"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn tokenize_collapses_whitespace() {
        assert_eq!(toks("  echo   a\tb \n"), vec!["echo", "a", "b"]);
    }

    #[test]
    fn tokenize_empty() {
        assert!(toks("   ").is_empty());
    }

    #[test]
    fn background_stripped() {
        let (t, bg) = strip_background(toks("sleep 1 &"));
        assert!(bg);
        assert_eq!(t, vec!["sleep", "1"]);
    }

    #[test]
    fn background_only_trailing() {
        let (t, bg) = strip_background(toks("echo & done"));
        assert!(!bg);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn background_alone() {
        let (t, bg) = strip_background(toks("&"));
        assert!(bg);
        assert!(t.is_empty());
    }

    #[test]
    fn split_three_stages() {
        let t = toks("cat f | sort | uniq -c");
        assert_eq!(pipe_count(&t), 2);
        let segs = split_pipeline(&t).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], &t[0..2]);
        assert_eq!(segs[1], &t[3..4]);
        assert_eq!(segs[2], &t[5..7]);
    }

    #[test]
    fn split_no_pipe() {
        let t = toks("echo hi");
        assert_eq!(split_pipeline(&t).unwrap().len(), 1);
    }

    #[test]
    fn err_leading_pipe() {
        assert_eq!(split_pipeline(&toks("| wc")), Err(ParseError::EmptyPipelineSegment));
    }

    #[test]
    fn err_trailing_pipe() {
        assert_eq!(split_pipeline(&toks("ls |")), Err(ParseError::EmptyPipelineSegment));
    }

    #[test]
    fn err_double_pipe() {
        assert_eq!(split_pipeline(&toks("ls | | wc")), Err(ParseError::EmptyPipelineSegment));
    }

    #[test]
    fn display_joins_with_space() {
        assert_eq!(display_command(&toks("sleep   5")), "sleep 5");
    }
}
