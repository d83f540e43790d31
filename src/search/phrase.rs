//! Rendered-text rechecks applied to intersection candidates.
//!
//! Exact-phrase verification is not backed by positional postings: the
//! candidate document's text is re-tokenized and the phrase tokens are
//! compared positionally against it. Negation rejects a candidate when any
//! negated token occurs anywhere in the stream.

use crate::models::Token;

/// True iff some offset `k` of `content` satisfies every phrase token:
/// `content[k + pos] == token.name` for every position of every token.
pub fn check_exact(tokens: &[Token], content: &[String]) -> bool {
    let token_matches = |token: &Token, offset: usize| -> bool {
        token.positions.iter().all(|&pos| {
            match content.get(offset + pos as usize) {
                Some(word) => *word == token.name,
                None => false,
            }
        })
    };

    (0..content.len()).any(|offset| tokens.iter().all(|token| token_matches(token, offset)))
}

/// True iff any of the tokens occurs in the content stream.
pub fn check_negation(tokens: &[Token], content: &[String]) -> bool {
    tokens
        .iter()
        .any(|token| content.iter().any(|word| *word == token.name))
}
