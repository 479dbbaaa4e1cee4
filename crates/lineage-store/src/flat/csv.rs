//! Quote-escaped, newline-delimited rows without a header
//!
//! A field is quoted when it contains a delimiter, a quote or a line break;
//! quotes inside quoted fields are doubled. Rows may span lines when a quoted
//! field contains newlines.

/// Escape one field
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a full row including its trailing newline
pub fn write_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Split file content into rows of unescaped fields
///
/// # Errors
///
/// Returns the 1-based row number of an unterminated quoted field.
pub fn parse_rows(content: &str) -> Result<Vec<Vec<String>>, usize> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(rows.len() + 1);
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields_are_not_quoted() {
        assert_eq!(write_row(&["0", "abc", "[1,2]"]), "0,abc,\"[1,2]\"\n");
    }

    #[test]
    fn test_embedded_quotes_and_newlines_survive() {
        let fields = ["say \"hi\"", "two\nlines", "", "a,b"];
        let rows = parse_rows(&write_row(&fields)).unwrap();
        assert_eq!(rows, vec![fields.iter().map(|s| s.to_string()).collect::<Vec<_>>()]);
    }

    #[test]
    fn test_rows_concatenate() {
        let content = format!("{}{}", write_row(&["1", "x"]), write_row(&["2", "y"]));
        assert_eq!(parse_rows(&content).unwrap().len(), 2);
    }

    #[test]
    fn test_unterminated_quote_reports_row() {
        assert_eq!(parse_rows("1,x\n2,\"open\n"), Err(2));
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_rows("").unwrap().is_empty());
    }
}
