//! First-match-wins merge of source score tables into a result table.

use crate::report::{EnumScoreEvent, ScoreObserver};
use crate::spec::{
    EnumRoundingRule, ScoreError, SpecCellWrite, SpecMergeOutcome, SpecScoreTable,
    SpecStudentSubjectKey,
};
use crate::util::coerce_score_value;

/// Fill every result key from the earliest source holding a non-empty score.
///
/// Writes keep the result sheet's coordinates. Keys no source can fill are
/// left untouched and produce no write.
pub fn merge<O>(
    result: SpecScoreTable,
    sources: &[SpecScoreTable],
    rule_rounding: EnumRoundingRule,
    observer: &mut O,
) -> Result<SpecMergeOutcome, ScoreError>
where
    O: ScoreObserver + ?Sized,
{
    if sources.is_empty() {
        return Err(ScoreError::NoSources);
    }

    let mut table = result;
    let mut l_writes = Vec::new();
    for (key, cell) in table.cells.iter_mut() {
        let Some((n_idx_source, raw_score)) = find_first_score(sources, key) else {
            observer.observe(&EnumScoreEvent::ScoreUnmatched {
                key: key.clone(),
                row: cell.row,
                column: cell.column,
            });
            continue;
        };

        cell.score_text = raw_score.to_string();
        let value = coerce_score_value(raw_score, rule_rounding);
        observer.observe(&EnumScoreEvent::ScoreFilled {
            key: key.clone(),
            source_index: n_idx_source,
            source_locator: sources[n_idx_source].locator.clone(),
            row: cell.row,
            column: cell.column,
            value: value.clone(),
        });
        l_writes.push(SpecCellWrite {
            row: cell.row,
            column: cell.column,
            value,
        });
    }

    Ok(SpecMergeOutcome {
        table,
        writes: l_writes,
    })
}

/// Index and text of the first source, in caller order, with a non-empty score for `key`.
pub fn find_first_score<'a>(
    sources: &'a [SpecScoreTable],
    key: &SpecStudentSubjectKey,
) -> Option<(usize, &'a str)> {
    sources
        .iter()
        .enumerate()
        .find_map(|(n_idx, source)| source.score_of(key).map(|score| (n_idx, score)))
}
