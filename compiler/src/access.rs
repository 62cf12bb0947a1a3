// access.rs — Grid-access extraction from operator bodies
//
// Operator bodies are opaque target-language expressions; the only part the
// optimizer interprets is the set of grid accesses of the form
// `name(i±d, j±d, k±d)` where each coordinate is its axis letter optionally
// followed by a signed single decimal digit. Producer stencils and external
// constants appear under the same syntax and are not distinguished here.
//
// Tokenizes with logos, then scans the token window for the access shape.
// Anything that does not match is skipped one token at a time, so extraction
// never fails on malformed text.
//
// Preconditions: body is valid UTF-8 (guaranteed by &str).
// Postconditions: returns every well-formed access; missing offsets are 0.
// Failure modes: none (out-of-grammar text is ignored).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use logos::Logos;

use crate::bounds::Offset;

/// Offset sets per referenced array name.
pub type AccessMap = BTreeMap<String, BTreeSet<Offset>>;

/// Tokens of the access sub-grammar. Every other character of the body is
/// lexed as noise and acts as a scan barrier.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
}

/// One lexed token with its source slice. `kind` is `None` for noise.
struct Lexeme<'a> {
    kind: Option<Token>,
    text: &'a str,
}

/// Extract all well-formed grid accesses from an operator body.
pub fn extract_accesses(body: &str) -> AccessMap {
    let lexemes: Vec<Lexeme<'_>> = Token::lexer(body)
        .spanned()
        .map(|(result, span)| Lexeme {
            kind: result.ok(),
            text: &body[span],
        })
        .collect();

    let mut accesses = AccessMap::new();
    let mut pos = 0;
    while pos < lexemes.len() {
        match match_access(&lexemes[pos..]) {
            Some((name, offset, consumed)) => {
                accesses
                    .entry(name.to_string())
                    .or_default()
                    .insert(offset);
                pos += consumed;
            }
            None => pos += 1,
        }
    }
    accesses
}

/// Render one access back into source form, e.g. `uin(i+1,j,k-2)`.
pub fn render_access(array: &str, offset: Offset) -> String {
    let coord = |axis: char, d: i32| {
        if d == 0 {
            axis.to_string()
        } else if d < 0 {
            format!("{axis}-{}", -d)
        } else {
            format!("{axis}+{d}")
        }
    };
    format!(
        "{array}({},{},{})",
        coord('i', offset[0]),
        coord('j', offset[1]),
        coord('k', offset[2])
    )
}

/// Try to match one access at the head of the window. Returns the array
/// name, the offset triple, and the number of lexemes consumed.
fn match_access<'a>(window: &[Lexeme<'a>]) -> Option<(&'a str, Offset, usize)> {
    let mut pos = 0;
    let name = expect(window, &mut pos, Token::Ident)?;
    expect(window, &mut pos, Token::LParen)?;
    let mut offset = [0i32; 3];
    for (axis, letter) in ["i", "j", "k"].iter().enumerate() {
        let coord = expect(window, &mut pos, Token::Ident)?;
        if coord != *letter {
            return None;
        }
        offset[axis] = match_offset(window, &mut pos)?;
        let close = if axis == 2 { Token::RParen } else { Token::Comma };
        expect(window, &mut pos, close)?;
    }
    Some((name, offset, pos))
}

/// Optional `+d` / `-d` with a single decimal digit; absent means 0.
fn match_offset(window: &[Lexeme<'_>], pos: &mut usize) -> Option<i32> {
    let sign = match window.get(*pos).and_then(|l| l.kind) {
        Some(Token::Plus) => 1,
        Some(Token::Minus) => -1,
        _ => return Some(0),
    };
    *pos += 1;
    let digits = expect(window, pos, Token::Int)?;
    if digits.len() != 1 {
        return None;
    }
    Some(sign * digits.parse::<i32>().ok()?)
}

fn expect<'a>(window: &[Lexeme<'a>], pos: &mut usize, kind: Token) -> Option<&'a str> {
    let lexeme = window.get(*pos)?;
    if lexeme.kind == Some(kind) {
        *pos += 1;
        Some(lexeme.text)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(map: &AccessMap, name: &str) -> Vec<Offset> {
        map[name].iter().copied().collect()
    }

    #[test]
    fn laplacian_body_yields_five_point_star() {
        let body = "auto res = \
            -4.0 * uin(i,j,k) + uin(i+1,j,k) + uin(i-1,j,k) + uin(i,j+1,k) + uin(i,j-1,k);";
        let map = extract_accesses(body);
        assert_eq!(map.len(), 1);
        assert_eq!(
            offsets(&map, "uin"),
            vec![
                [-1, 0, 0],
                [0, -1, 0],
                [0, 0, 0],
                [0, 1, 0],
                [1, 0, 0]
            ]
        );
    }

    #[test]
    fn missing_offsets_are_zero() {
        let map = extract_accesses("auto res = wgt(i,j,k) * flx(i-1,j,k);");
        assert_eq!(offsets(&map, "wgt"), vec![[0, 0, 0]]);
        assert_eq!(offsets(&map, "flx"), vec![[-1, 0, 0]]);
    }

    #[test]
    fn duplicate_accesses_collapse() {
        let map = extract_accesses("auto a = ulap(i,j,k); auto b = ulap(i,j,k) - ulap(i+1,j,k);");
        assert_eq!(offsets(&map, "ulap"), vec![[0, 0, 0], [1, 0, 0]]);
    }

    #[test]
    fn malformed_accesses_are_ignored() {
        // wrong axis order, two-digit offset, missing coordinate
        let map = extract_accesses("a(j,i,k) + b(i+10,j,k) + c(i,j) + d(i,j,k-2)");
        assert_eq!(map.len(), 1);
        assert_eq!(offsets(&map, "d"), vec![[0, 0, -2]]);
    }

    #[test]
    fn digit_suffixed_array_names_are_plain_identifiers() {
        let map = extract_accesses("auto res = o7(i,j,k) + k88(i-1,j,k+1);");
        assert_eq!(offsets(&map, "o7"), vec![[0, 0, 0]]);
        assert_eq!(offsets(&map, "k88"), vec![[-1, 0, 1]]);
    }

    #[test]
    fn conditional_bodies_scan_past_operators() {
        let body = "auto fli = ulap(i+1,j,k) - ulap(i,j,k); \
                    auto res = fli * (uin(i+1,j,k) - uin(i,j,k)) > 0.0 ? 0.0 : fli;";
        let map = extract_accesses(body);
        assert_eq!(offsets(&map, "ulap"), vec![[0, 0, 0], [1, 0, 0]]);
        assert_eq!(offsets(&map, "uin"), vec![[0, 0, 0], [1, 0, 0]]);
    }

    #[test]
    fn render_round_trips_through_extraction() {
        let rendered = render_access("fli", [-1, 0, 2]);
        assert_eq!(rendered, "fli(i-1,j,k+2)");
        let map = extract_accesses(&rendered);
        assert_eq!(offsets(&map, "fli"), vec![[-1, 0, 2]]);
    }

    #[test]
    fn constant_body_has_no_accesses() {
        assert!(extract_accesses("auto res = 1.0;").is_empty());
    }
}
