//! Whitespace and punctuation normalisation for extracted text.

/// Collapse whitespace, drop spaces before `,;:!?.` and ensure one space
/// after a punctuation mark that is followed by something else.
///
/// Decimal numbers and bracketed references like `2(a)` are left alone:
/// a space is only inserted after punctuation when the next character is a
/// letter.
pub fn normalize_text(input: &str) -> String {
    let collapsed: Vec<char> = input.split_whitespace().collect::<Vec<_>>().join(" ").chars().collect();
    let mut out = String::with_capacity(collapsed.len());

    for (i, &c) in collapsed.iter().enumerate() {
        if c == ' ' && collapsed.get(i + 1).is_some_and(|n| is_punct(*n)) {
            continue;
        }
        out.push(c);
        if is_punct(c) && collapsed.get(i + 1).is_some_and(|n| n.is_alphabetic()) {
            out.push(' ');
        }
    }
    out
}

fn is_punct(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '!' | '?' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_text("  a \n\t b  "), "a b");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn punctuation_spacing() {
        assert_eq!(normalize_text("Whereas ,the Union ."), "Whereas, the Union.");
        assert_eq!(normalize_text("one;two:three"), "one; two: three");
    }

    #[test]
    fn numbers_are_untouched() {
        assert_eq!(normalize_text("Article 2(a), 1.5 million"), "Article 2(a), 1.5 million");
        assert_eq!(normalize_text("Regulation (EU) 2016/679."), "Regulation (EU) 2016/679.");
    }

    #[test]
    fn closing_brackets_get_no_space() {
        assert_eq!(normalize_text("point 2(a)applies"), "point 2(a)applies");
        assert_eq!(normalize_text("(1)Whereas"), "(1)Whereas");
        assert_eq!(normalize_text("Article 3(1)(b) , second"), "Article 3(1)(b), second");
    }
}
