//! Relevance ranking over FTS4 `matchinfo(…, 'pcx')` statistics.
//!
//! The blob is a sequence of native-endian `u32`: the phrase count, the column
//! count, then for every phrase and column a triple of hits in this row, hits
//! in all rows, and rows with at least one hit.

/// Default cap on the number of ids a keyword query returns.
pub const KEYWORD_LIMIT: usize = 1024;

pub(crate) fn parse(blob: &[u8]) -> Vec<u32> {
    blob.chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Sums `hits / (all_hits / docs_with_hits) * (1.2 - 0.1 * phrase)` over every matched phrase and column.
pub fn weight(matchinfo: &[u32]) -> f64 {
    let (phrases, columns) = match matchinfo {
        [p, c, ..] => (*p as usize, *c as usize),
        _ => return 0.0,
    };
    let mut weight = 0.0;
    for phrase in 0..phrases {
        for column in 0..columns {
            let base = 2 + 3 * (phrase * columns + column);
            let Some(&[this_row, all_rows, docs]) = matchinfo.get(base..base + 3) else {
                return weight;
            };
            if this_row > 0 && all_rows > 0 && docs > 0 {
                let frequency = f64::from(all_rows) / f64::from(docs);
                weight += f64::from(this_row) / frequency * (1.2 - 0.1 * phrase as f64);
            }
        }
    }
    weight
}

/// Orders ids by descending weight, breaking ties by id, and keeps at most `limit`.
pub(crate) fn top(mut scored: Vec<(i64, f64)>, limit: usize) -> Vec<i64> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(limit).map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn parses_native_endian_words() {
        assert_eq!(parse(&blob(&[1, 1, 2, 4, 3])), vec![1, 1, 2, 4, 3]);
        assert!(parse(&[1, 2]).is_empty());
    }

    #[test]
    fn rarer_hits_weigh_more() {
        // one phrase, one column: 2 hits here, 4 hits over 2 docs in total
        let common = weight(&[1, 1, 2, 4, 2]);
        assert!((common - 1.2).abs() < 1e-9);
        // same hits in this row, but the term is rarer across the corpus
        let rare = weight(&[1, 1, 2, 2, 2]);
        assert!((rare - 2.4).abs() < 1e-9);
        assert!(rare > common);
        let strong = weight(&[1, 1, 3, 4, 2]);
        assert!(strong > common);
    }

    #[test]
    fn later_phrases_count_less() {
        let first = weight(&[2, 1, 1, 1, 1, 0, 1, 1]);
        let second = weight(&[2, 1, 0, 1, 1, 1, 1, 1]);
        assert!(first > second);
        assert!((second - 1.1).abs() < 1e-9);
    }

    #[test]
    fn truncated_blobs_do_not_panic() {
        assert_eq!(weight(&[]), 0.0);
        assert_eq!(weight(&[3, 3, 1]), 0.0);
    }

    #[test]
    fn top_sorts_and_limits() {
        let scored = vec![(1, 0.5), (2, 2.0), (3, 2.0), (4, 1.0)];
        assert_eq!(top(scored.clone(), 10), vec![2, 3, 4, 1]);
        assert_eq!(top(scored, 2), vec![2, 3]);
        let many: Vec<(i64, f64)> = (0..3000).map(|i| (i, 1.0)).collect();
        assert_eq!(top(many, KEYWORD_LIMIT).len(), KEYWORD_LIMIT);
    }
}
