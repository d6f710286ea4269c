//! Query batch input parsing.
//!
//! Each line of the batch file reads `<plan_id>|<json_object>`; the JSON
//! object's fields become named string parameters for one query instance.
//! Malformed lines are reported and skipped, and a batch file that cannot
//! be opened yields an empty query set, not a fatal error.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

pub type QueryParams = HashMap<String, String>;

/// Parse the query batch file into parameter lists grouped by plan id.
pub fn parse_query_config(path: impl AsRef<Path>) -> BTreeMap<u32, Vec<QueryParams>> {
    let path = path.as_ref();
    let mut queries: BTreeMap<u32, Vec<QueryParams>> = BTreeMap::new();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open query config");
            return queries;
        }
    };

    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "cannot read query config line");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let Some((id_part, json_part)) = line.split_once('|') else {
            warn!(%line, "malformed query line, missing separator");
            continue;
        };
        let id: u32 = match id_part.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(%line, "malformed query line, bad plan id");
                continue;
            }
        };
        let value: serde_json::Value = match serde_json::from_str(json_part) {
            Ok(v) => v,
            Err(e) => {
                warn!(%line, error = %e, "malformed query parameters");
                continue;
            }
        };
        let Some(object) = value.as_object() else {
            warn!(%line, "query parameters must be a JSON object");
            continue;
        };

        let mut params = QueryParams::with_capacity(object.len());
        let mut valid = true;
        for (key, value) in object {
            match value.as_str() {
                Some(s) => {
                    params.insert(key.clone(), s.to_string());
                }
                None => {
                    warn!(%line, key = %key, "non-string parameter value, skipping line");
                    valid = false;
                    break;
                }
            }
        }
        if valid {
            queries.entry(id).or_default().push(params);
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_lines(lines: &str) -> BTreeMap<u32, Vec<QueryParams>> {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queries.txt");
        let mut file = File::create(&path).unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        drop(file);
        parse_query_config(&path)
    }

    #[test]
    fn test_valid_line_parses() {
        let queries = parse_lines("3|{\"tag\": \"Peru\"}\n");
        assert_eq!(queries.len(), 1);
        let batch = &queries[&3];
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].get("tag").map(String::as_str), Some("Peru"));
    }

    #[test]
    fn test_line_without_separator_is_skipped() {
        let queries = parse_lines("3|{\"tag\": \"Peru\"}\nno separator here\n");
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[&3].len(), 1);
    }

    #[test]
    fn test_malformed_json_is_skipped() {
        let queries = parse_lines("1|{broken\n1|{\"ok\": \"yes\"}\n");
        assert_eq!(queries[&1].len(), 1);
        assert_eq!(queries[&1][0].get("ok").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_non_string_value_skips_line() {
        let queries = parse_lines("1|{\"n\": 42}\n");
        assert!(queries.is_empty());
    }

    #[test]
    fn test_multiple_parameterizations_group_by_plan() {
        let queries = parse_lines("2|{\"tag\": \"Chile\"}\n2|{\"tag\": \"Peru\"}\n5|{}\n");
        assert_eq!(queries[&2].len(), 2);
        assert_eq!(queries[&5].len(), 1);
        assert!(queries[&5][0].is_empty());
    }

    #[test]
    fn test_missing_file_yields_empty_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let queries = parse_query_config(dir.path().join("absent.txt"));
        assert!(queries.is_empty());
    }
}
