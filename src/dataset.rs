//! Whitespace-delimited numeric record loading.
//!
//! One record per line, every field parseable as a real number. The
//! loaders are strict: a line with the wrong field count or an
//! unparseable field fails the whole load, there is no partial recovery.

use std::io::BufRead;
use std::num::ParseFloatError;

use log::debug;
use thiserror::Error;

/// One labeled training record: the input values followed by the target
/// values, stored concatenated. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    values: Box<[f64]>,
    inputs_len: usize,
}

impl Example {
    /// Builds an example from separate input and target slices.
    pub fn from_parts(inputs: &[f64], targets: &[f64]) -> Example {
        let mut values = Vec::with_capacity(inputs.len() + targets.len());
        values.extend_from_slice(inputs);
        values.extend_from_slice(targets);
        Example {
            values: values.into_boxed_slice(),
            inputs_len: inputs.len(),
        }
    }

    /// The input prefix of the record.
    pub fn inputs(&self) -> &[f64] {
        &self.values[..self.inputs_len]
    }

    /// The target suffix of the record.
    pub fn targets(&self) -> &[f64] {
        &self.values[self.inputs_len..]
    }
}

/// Errors from the record loaders. All of them abort the load.
#[derive(Debug, Error)]
pub enum DataError {
    /// A line held the wrong number of whitespace-separated fields.
    #[error("line {line}: expected {expected} fields, got {got}")]
    WrongFieldCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    /// A field failed to parse as a real number.
    #[error("line {line}: bad number {token:?}")]
    BadNumber {
        line: usize,
        token: String,
        source: ParseFloatError,
    },

    /// The underlying reader failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads labeled training records: `inputs_len` input values followed by
/// `targets_len` target values per line, in file order.
pub fn read_examples<R: BufRead>(
    reader: R,
    inputs_len: usize,
    targets_len: usize,
) -> Result<Vec<Example>, DataError> {
    let records = read_records(reader, inputs_len + targets_len)?;
    debug!("loaded {} labeled records", records.len());
    Ok(records
        .into_iter()
        .map(|values| Example { values, inputs_len })
        .collect())
}

/// Reads unlabeled records of `inputs_len` input values per line.
pub fn read_inputs<R: BufRead>(reader: R, inputs_len: usize) -> Result<Vec<Box<[f64]>>, DataError> {
    let records = read_records(reader, inputs_len)?;
    debug!("loaded {} unlabeled records", records.len());
    Ok(records)
}

/// Shared line-oriented reader: skips blank lines, demands exactly
/// `fields` numeric tokens everywhere else.
fn read_records<R: BufRead>(reader: R, fields: usize) -> Result<Vec<Box<[f64]>>, DataError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let number = i + 1;

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != fields {
            return Err(DataError::WrongFieldCount {
                line: number,
                expected: fields,
                got: tokens.len(),
            });
        }

        let mut values = Vec::with_capacity(fields);
        for token in tokens {
            let value = token.parse::<f64>().map_err(|source| DataError::BadNumber {
                line: number,
                token: token.to_string(),
                source,
            })?;
            values.push(value);
        }
        records.push(values.into_boxed_slice());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_labeled_records_in_file_order() {
        let data = "0 0 0\n0 1 1\n1 0 1\n1 1 0\n";
        let examples = read_examples(data.as_bytes(), 2, 1).unwrap();
        assert_eq!(examples.len(), 4);
        assert_eq!(examples[1].inputs(), &[0.0, 1.0][..]);
        assert_eq!(examples[1].targets(), &[1.0][..]);
    }

    #[test]
    fn reads_unlabeled_records() {
        let data = "0.5 -1.5\n2e-3 .25\n";
        let records = read_inputs(data.as_bytes(), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&*records[1], &[2e-3, 0.25][..]);
    }

    #[test]
    fn skips_blank_lines() {
        let data = "\n1 2\n\n3 4\n\n";
        let records = read_inputs(data.as_bytes(), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&*records[1], &[3.0, 4.0][..]);
    }

    #[test]
    fn rejects_wrong_field_count_with_line_number() {
        let data = "1 2 3\n4 5\n";
        let err = read_examples(data.as_bytes(), 2, 1).unwrap_err();
        match err {
            DataError::WrongFieldCount {
                line,
                expected,
                got,
            } => assert_eq!((line, expected, got), (2, 3, 2)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn rejects_unparseable_tokens() {
        let data = "1 x\n";
        let err = read_inputs(data.as_bytes(), 2).unwrap_err();
        match err {
            DataError::BadNumber { line, token, .. } => {
                assert_eq!(line, 1);
                assert_eq!(token, "x");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn splits_examples_into_inputs_and_targets() {
        let example = Example::from_parts(&[1.0, 2.0], &[3.0]);
        assert_eq!(example.inputs(), &[1.0, 2.0][..]);
        assert_eq!(example.targets(), &[3.0][..]);
    }
}
