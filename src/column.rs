//! Conversions between spreadsheet column labels and zero-based indices.

use crate::error::{Result, ToolError};

/// Converts a column label such as `C` or `AA` into its zero-based index.
///
/// Labels are case-insensitive and surrounding whitespace is ignored. The
/// label is read as a base-26 numeral whose digits run from `A = 1` to
/// `Z = 26`, so `A` maps to 0 and `AA` to 26.
pub fn column_index(label: &str) -> Result<usize> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidLabel(label.to_string()));
    }

    let mut index: usize = 0;
    for character in trimmed.chars() {
        if !character.is_ascii_alphabetic() {
            return Err(ToolError::InvalidLabel(label.to_string()));
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        index = index
            .checked_mul(26)
            .and_then(|value| value.checked_add(digit))
            .ok_or_else(|| ToolError::InvalidLabel(label.to_string()))?;
    }
    Ok(index - 1)
}

/// Converts a zero-based column index back into its label.
pub fn column_label(index: usize) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push((b'A' + digit as u8) as char);
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Builds an A1-style reference from zero-based coordinates.
pub fn cell_reference(row: u32, column: usize) -> String {
    format!("{}{}", column_label(column), row + 1)
}

/// Splits an A1-style reference into zero-based `(row, column)` coordinates.
pub fn parse_cell_reference(reference: &str) -> Result<(u32, usize)> {
    let split = reference
        .find(|character: char| character.is_ascii_digit())
        .ok_or_else(|| ToolError::InvalidLabel(reference.to_string()))?;
    let (letters, digits) = reference.split_at(split);
    let column = column_index(letters)?;
    let row: u32 = digits
        .parse()
        .map_err(|_| ToolError::InvalidLabel(reference.to_string()))?;
    if row == 0 {
        return Err(ToolError::InvalidLabel(reference.to_string()));
    }
    Ok((row - 1, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letters_map_to_their_alphabet_position() {
        for (offset, letter) in ('A'..='Z').enumerate() {
            assert_eq!(column_index(&letter.to_string()).unwrap(), offset);
        }
    }

    #[test]
    fn multi_letter_labels_continue_the_sequence() {
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("AZ").unwrap(), 51);
        assert_eq!(column_index("BA").unwrap(), 52);
        assert_eq!(column_index("XFD").unwrap(), 16_383);
    }

    #[test]
    fn labels_are_case_insensitive_and_trimmed() {
        assert_eq!(column_index(" c ").unwrap(), 2);
        assert_eq!(column_index("aB").unwrap(), 27);
    }

    #[test]
    fn malformed_labels_are_rejected() {
        assert!(matches!(column_index(""), Err(ToolError::InvalidLabel(_))));
        assert!(matches!(column_index("  "), Err(ToolError::InvalidLabel(_))));
        assert!(matches!(column_index("A1"), Err(ToolError::InvalidLabel(_))));
        assert!(matches!(column_index("É"), Err(ToolError::InvalidLabel(_))));
    }

    #[test]
    fn labels_round_trip_through_indices() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(3), "D");
        assert_eq!(column_label(26), "AA");
        assert_eq!(column_label(51), "AZ");
        assert_eq!(cell_reference(4, 3), "D5");
    }

    #[test]
    fn references_split_into_coordinates() {
        assert_eq!(parse_cell_reference("D5").unwrap(), (4, 3));
        assert_eq!(parse_cell_reference("AA10").unwrap(), (9, 26));
        assert!(parse_cell_reference("D0").is_err());
        assert!(parse_cell_reference("12").is_err());
    }
}
