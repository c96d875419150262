use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command line")]
    EmptyLine,
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("dangling escape at end of line")]
    DanglingEscape,
}

/// Splits a console line into argument tokens.
///
/// Whitespace outside quotes separates tokens. `"` toggles quoting and `\`
/// takes the next character literally, inside or outside quotes. A pair of
/// quotes with nothing between them still produces an (empty) token.
pub fn tokenize_line(line: &str) -> Result<Vec<String>, ParseError> {
    if line.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaping = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        if escaping {
            current.push(ch);
            seen_token_content = true;
            escaping = false;
            continue;
        }

        match ch {
            '\\' => {
                escaping = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if escaping {
        return Err(ParseError::DanglingEscape);
    }
    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }

    if seen_token_content {
        tokens.push(current);
    }

    Ok(tokens)
}
