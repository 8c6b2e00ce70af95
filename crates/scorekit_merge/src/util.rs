//! Stateless helpers: column-axis codec and score coercion.

use crate::conf::N_COLS_MAX;
use crate::spec::{EnumCellWriteValue, EnumRoundingRule, ScoreError};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnAxisCodec

/// Convert a 1-based column number to its bijective base-26 label (`1 -> "A"`, `27 -> "AA"`).
pub fn column_number_to_name(n: u32) -> Result<String, ScoreError> {
    if n < 1 {
        return Err(ScoreError::InvalidColumn(n));
    }

    let mut n_rest = n;
    let mut l_letters = Vec::new();
    while n_rest > 0 {
        let n_digit = (n_rest - 1) % 26;
        l_letters.push(char::from(b'A' + n_digit as u8));
        n_rest = (n_rest - 1) / 26;
    }
    Ok(l_letters.into_iter().rev().collect())
}

/// Convert a column label (case-insensitive, `A..=XFD`) back to its 1-based number.
pub fn column_name_to_number(name: &str) -> Result<u32, ScoreError> {
    let c_name = name.trim();
    if c_name.is_empty() || c_name.len() > 3 {
        return Err(ScoreError::InvalidColumnName(name.to_string()));
    }

    let mut n_col: u32 = 0;
    for ch in c_name.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ScoreError::InvalidColumnName(name.to_string()));
        }
        let n_digit = u32::from(ch.to_ascii_uppercase()) - u32::from('A') + 1;
        n_col = n_col * 26 + n_digit;
    }

    if n_col > N_COLS_MAX {
        return Err(ScoreError::InvalidColumnName(name.to_string()));
    }
    Ok(n_col)
}

/// Format a 1-based `(row, column)` pair as an A1 reference, e.g. `(3, 4) -> "D3"`.
pub fn derive_cell_axis(row: u32, column: u32) -> Result<String, ScoreError> {
    if row < 1 {
        return Err(ScoreError::InvalidRow(row));
    }
    Ok(format!("{}{row}", column_number_to_name(column)?))
}

/// Best-effort A1 reference for diagnostics; falls back to `R{row}C{column}`.
pub(crate) fn format_cell_axis(row: u32, column: u32) -> String {
    derive_cell_axis(row, column).unwrap_or_else(|_| format!("R{row}C{column}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ScoreCoercion

/// Round `x` to the nearest integer under `rule`.
pub fn round_score(x: f64, rule: EnumRoundingRule) -> f64 {
    match rule {
        EnumRoundingRule::HalfAwayFromZero => x.round(),
        EnumRoundingRule::HalfToEven => x.round_ties_even(),
    }
}

/// Coerce raw score text into the value written back to the result sheet.
///
/// Finite decimals whose rounded value fits in `i64` become integers; anything
/// else (markers such as `缺考`, `NaN`, `inf`, huge numbers) is kept as text.
pub fn coerce_score_value(raw: &str, rule: EnumRoundingRule) -> EnumCellWriteValue {
    let Ok(x) = raw.parse::<f64>() else {
        return EnumCellWriteValue::Text(raw.to_string());
    };
    if !x.is_finite() {
        return EnumCellWriteValue::Text(raw.to_string());
    }

    let x_rounded = round_score(x, rule);
    if x_rounded < i64::MIN as f64 || x_rounded >= i64::MAX as f64 {
        return EnumCellWriteValue::Text(raw.to_string());
    }
    EnumCellWriteValue::Integer(x_rounded as i64)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_number_to_name_matches_known_labels() {
        let l_cases = [
            (1, "A"),
            (26, "Z"),
            (27, "AA"),
            (28, "AB"),
            (52, "AZ"),
            (53, "BA"),
            (702, "ZZ"),
            (703, "AAA"),
            (16_384, "XFD"),
        ];
        for (n, c_name) in l_cases {
            assert_eq!(column_number_to_name(n).expect("valid column"), c_name);
        }
    }

    #[test]
    fn column_number_zero_is_rejected() {
        assert_eq!(column_number_to_name(0), Err(ScoreError::InvalidColumn(0)));
    }

    #[test]
    fn column_codec_round_trips() {
        for n in 1..=10_000 {
            let c_name = column_number_to_name(n).expect("valid column");
            assert_eq!(column_name_to_number(&c_name).expect("valid name"), n);
        }
    }

    #[test]
    fn column_name_to_number_is_case_insensitive_and_bounded() {
        assert_eq!(column_name_to_number("ab").expect("valid name"), 28);
        assert!(matches!(
            column_name_to_number("XFE"),
            Err(ScoreError::InvalidColumnName(_))
        ));
        assert!(matches!(
            column_name_to_number("A1"),
            Err(ScoreError::InvalidColumnName(_))
        ));
        assert!(matches!(
            column_name_to_number(""),
            Err(ScoreError::InvalidColumnName(_))
        ));
        assert!(matches!(
            column_name_to_number("ABCD"),
            Err(ScoreError::InvalidColumnName(_))
        ));
    }

    #[test]
    fn derive_cell_axis_formats_a1_reference() {
        assert_eq!(derive_cell_axis(3, 4).expect("valid cell"), "D3");
        assert_eq!(derive_cell_axis(0, 4), Err(ScoreError::InvalidRow(0)));
        assert_eq!(format_cell_axis(2, 0), "R2C0");
    }

    #[test]
    fn coerce_score_value_rounds_numbers_and_keeps_markers() {
        let rule = EnumRoundingRule::HalfAwayFromZero;
        assert_eq!(coerce_score_value("87.5", rule), EnumCellWriteValue::Integer(88));
        assert_eq!(coerce_score_value("86.5", rule), EnumCellWriteValue::Integer(87));
        assert_eq!(coerce_score_value("-2.5", rule), EnumCellWriteValue::Integer(-3));
        assert_eq!(coerce_score_value("90", rule), EnumCellWriteValue::Integer(90));
        assert_eq!(coerce_score_value("1e2", rule), EnumCellWriteValue::Integer(100));
        assert_eq!(
            coerce_score_value("缺考", rule),
            EnumCellWriteValue::Text("缺考".to_string())
        );
        assert_eq!(
            coerce_score_value("NaN", rule),
            EnumCellWriteValue::Text("NaN".to_string())
        );
        assert_eq!(
            coerce_score_value("1e300", rule),
            EnumCellWriteValue::Text("1e300".to_string())
        );
    }

    #[test]
    fn coerce_score_value_half_to_even() {
        let rule = EnumRoundingRule::HalfToEven;
        assert_eq!(coerce_score_value("87.5", rule), EnumCellWriteValue::Integer(88));
        assert_eq!(coerce_score_value("86.5", rule), EnumCellWriteValue::Integer(86));
        assert_eq!(coerce_score_value("86.51", rule), EnumCellWriteValue::Integer(87));
    }
}
